//! LinkedIn company page resolution (Enrich CRM)

use crate::core::config::EnrichCrmSettings;
use crate::core::Company;
use crate::execution::RateLimiter;
use crate::providers::http::{lookup, HttpClient};
use crate::providers::{IdentityResolver, ProviderError};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::debug;

const PROVIDER: &str = "enrich_crm";

/// Where the LinkedIn URL may appear in a lookup response, in priority order
const LINKEDIN_PATHS: &[&[&str]] = &[
    &["company", "firmographics", "linkedinUrl"],
    &["company", "firmographics", "linkedin"],
    &["linkedinUrl"],
    &["linkedin"],
    &["company", "linkedinUrl"],
    &["company", "linkedin"],
    &["company", "socials", "linkedin"],
    &["company", "socials", "linkedinUrl"],
];

pub struct EnrichCrmClient {
    http: HttpClient,
    settings: EnrichCrmSettings,
    limiter: Arc<RateLimiter>,
}

impl EnrichCrmClient {
    pub fn new(http: HttpClient, settings: EnrichCrmSettings, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http,
            settings,
            limiter,
        }
    }

    /// Fuzzy company lookup by name
    pub async fn lookup(&self, company_name: &str) -> Result<Value, ProviderError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured(PROVIDER))?;
        let query = [
            ("apiId", api_key),
            ("data", company_name),
            ("firmographic", "true"),
            ("debug", "true"),
        ];

        self.limiter.acquire().await;
        let url = format!("{}/full", self.settings.base_url);
        self.http
            .json(
                PROVIDER,
                self.http
                    .inner()
                    .get(url)
                    .header("accept", "application/json")
                    .query(&query),
            )
            .await
    }
}

#[async_trait]
impl IdentityResolver for EnrichCrmClient {
    async fn resolve(&self, company: &Company) -> Result<Option<String>, ProviderError> {
        let body = self.lookup(&company.name).await?;
        let url = extract_linkedin_url(&body);
        debug!("{} -> {:?}", company.name, url);
        Ok(url)
    }
}

static COMPANY_PAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:[a-z]{2,3}\.)?linkedin\.com/(?:company|school|showcase)/[^/?#\s]+")
        .expect("valid regex")
});

/// First LinkedIn company page URL found along [`LINKEDIN_PATHS`]
///
/// Values that are not company pages (profiles, bare domains) are ignored.
/// A missing scheme is filled in as `https://`.
pub fn extract_linkedin_url(body: &Value) -> Option<String> {
    LINKEDIN_PATHS
        .iter()
        .filter_map(|path| lookup(body, path).and_then(Value::as_str))
        .map(str::trim)
        .find(|candidate| COMPANY_PAGE_RE.is_match(candidate))
        .map(|url| {
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{}", url)
            }
        })
}
