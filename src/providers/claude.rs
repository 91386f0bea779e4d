//! Decision-maker shortlisting through the Claude messages API

use crate::core::config::ClaudeSettings;
use crate::core::{Contact, Employee};
use crate::execution::RateLimiter;
use crate::providers::http::HttpClient;
use crate::providers::{DecisionMakerFilter, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const PROVIDER: &str = "claude";
const API_VERSION: &str = "2023-06-01";

pub struct ClaudeFilter {
    http: HttpClient,
    settings: ClaudeSettings,
    limiter: Arc<RateLimiter>,
}

/// One entry of the model's JSON answer
#[derive(Debug, Deserialize)]
struct Shortlisted {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    linkedin_url: Option<String>,
    #[serde(default)]
    persona_type: Option<String>,
}

impl ClaudeFilter {
    pub fn new(http: HttpClient, settings: ClaudeSettings, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http,
            settings,
            limiter,
        }
    }

    pub fn build_prompt(&self, candidates: &[Employee], company_name: &str) -> String {
        let listing = candidates
            .iter()
            .take(self.settings.max_candidates)
            .map(|e| {
                format!(
                    "- {}: {} ({})",
                    e.name,
                    e.title.as_deref().unwrap_or("N/A"),
                    e.linkedin_url
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Review the employees of "{company}" and identify the {max} most relevant decision makers.

Target personas: {personas}

Employees:
{listing}

Instructions:
1. Select only profiles matching the target personas
2. Prioritize: CEO/Managing director > CIO/CTO > HR director > CFO > other directors
3. Answer with JSON only, in exactly this format:

[
  {{"name": "First Last", "title": "Title", "linkedin_url": "URL", "persona_type": "CEO|DSI|DRH|DAF|Other"}}
]

If no decision maker is found, answer: []"#,
            company = company_name,
            max = self.settings.max_personas,
            personas = self.settings.target_personas.join(", "),
            listing = listing,
        )
    }
}

#[async_trait]
impl DecisionMakerFilter for ClaudeFilter {
    async fn filter(
        &self,
        candidates: &[Employee],
        company_name: &str,
    ) -> Result<Vec<Contact>, ProviderError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured(PROVIDER))?;

        let payload = json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "messages": [
                { "role": "user", "content": self.build_prompt(candidates, company_name) }
            ],
        });

        self.limiter.acquire().await;
        let url = format!("{}/v1/messages", self.settings.base_url);
        let body = self
            .http
            .json(
                PROVIDER,
                self.http
                    .inner()
                    .post(url)
                    .header("x-api-key", api_key)
                    .header("anthropic-version", API_VERSION)
                    .json(&payload),
            )
            .await?;

        let text = body
            .get("content")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("text"))
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::decode(PROVIDER, "response has no text content"))?;

        let shortlist = parse_shortlist(text, self.settings.max_personas)?;
        debug!("{}: {} decision makers", company_name, shortlist.len());
        Ok(shortlist
            .into_iter()
            .map(|s| to_contact(s, candidates))
            .collect())
    }
}

fn parse_shortlist(text: &str, max_personas: usize) -> Result<Vec<Shortlisted>, ProviderError> {
    let cleaned = strip_code_fence(text);
    let mut shortlist: Vec<Shortlisted> = serde_json::from_str(cleaned)
        .map_err(|e| ProviderError::decode(PROVIDER, format!("invalid shortlist JSON: {}", e)))?;
    shortlist.truncate(max_personas);
    Ok(shortlist)
}

/// Remove a surrounding Markdown code fence (with or without a `json` tag)
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let inner = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    inner.trim()
}

/// Carry the scraped first/last name over when the profile URL matches
fn to_contact(shortlisted: Shortlisted, candidates: &[Employee]) -> Contact {
    let source = shortlisted
        .linkedin_url
        .as_deref()
        .and_then(|url| candidates.iter().find(|e| e.linkedin_url == url));

    Contact {
        name: shortlisted.name,
        first_name: source.and_then(|e| e.first_name.clone()),
        last_name: source.and_then(|e| e.last_name.clone()),
        title: shortlisted.title,
        linkedin_url: shortlisted.linkedin_url.filter(|u| !u.is_empty()),
        persona_type: shortlisted.persona_type,
        ..Default::default()
    }
}
