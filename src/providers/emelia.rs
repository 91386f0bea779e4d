//! Outreach campaign push through the Emelia GraphQL API

use crate::core::config::EmeliaSettings;
use crate::core::Contact;
use crate::execution::RateLimiter;
use crate::providers::http::HttpClient;
use crate::providers::{CampaignSink, ProviderError, PushReport};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const PROVIDER: &str = "emelia";

const CAMPAIGN_QUERY: &str = r#"
query campaign($id: ID!) {
    campaign(id: $id) {
        _id
        name
        status
    }
}
"#;

const ADD_CONTACT_MUTATION: &str = r#"
mutation addContactToCampaignHook($id: ID!, $contact: JSON!) {
    addContactToCampaignHook(id: $id, contact: $contact)
}
"#;

pub struct EmeliaClient {
    http: HttpClient,
    settings: EmeliaSettings,
    limiter: Arc<RateLimiter>,
}

impl EmeliaClient {
    pub fn new(http: HttpClient, settings: EmeliaSettings, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http,
            settings,
            limiter,
        }
    }

    async fn execute(&self, query: &str, variables: Value) -> Result<Value, ProviderError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured(PROVIDER))?;

        self.limiter.acquire().await;
        let body = self
            .http
            .json(
                PROVIDER,
                self.http
                    .inner()
                    .post(&self.settings.endpoint)
                    .header("Authorization", api_key)
                    .json(&json!({ "query": query, "variables": variables })),
            )
            .await?;

        if let Some(errors) = body.get("errors") {
            return Err(ProviderError::decode(PROVIDER, errors.to_string()));
        }
        Ok(body.get("data").cloned().unwrap_or(Value::Null))
    }

    async fn add_contact(
        &self,
        campaign_id: &str,
        contact: &Contact,
    ) -> Result<bool, ProviderError> {
        let data = self
            .execute(
                ADD_CONTACT_MUTATION,
                json!({ "id": campaign_id, "contact": campaign_contact(contact) }),
            )
            .await?;
        Ok(data
            .get("addContactToCampaignHook")
            .is_some_and(|v| !v.is_null() && v != &Value::Bool(false)))
    }
}

#[async_trait]
impl CampaignSink for EmeliaClient {
    async fn push(&self, contacts: &[Contact]) -> Result<PushReport, ProviderError> {
        let campaign_id = self
            .settings
            .campaign_id
            .as_deref()
            .ok_or(ProviderError::NotConfigured("emelia campaign"))?;

        let campaign = self
            .execute(CAMPAIGN_QUERY, json!({ "id": campaign_id }))
            .await?;
        let campaign = campaign
            .get("campaign")
            .filter(|c| !c.is_null())
            .ok_or_else(|| {
                ProviderError::decode(PROVIDER, format!("campaign {} not found", campaign_id))
            })?;
        let name = campaign
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(campaign_id);
        let status = campaign
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        info!("Pushing to campaign {} ({})", name, status);

        let mut report = PushReport::default();
        for contact in contacts.iter().filter(|c| c.has_email()) {
            match self.add_contact(campaign_id, contact).await {
                Ok(true) => {
                    debug!("Added {} to campaign", contact.name);
                    report.pushed += 1;
                }
                Ok(false) => {
                    report.failed += 1;
                    let email = contact.email.as_deref().unwrap_or_default();
                    report.errors.push(format!("{}: rejected", email));
                }
                Err(e) => {
                    warn!("Could not add {} to campaign: {}", contact.name, e);
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", contact.name, e));
                }
            }
        }
        Ok(report)
    }
}

/// Contact payload in the campaign's field names
pub fn campaign_contact(contact: &Contact) -> Value {
    let (first_name, last_name) = contact.split_name();
    json!({
        "firstName": first_name,
        "lastName": last_name,
        "email": contact.email.as_deref().unwrap_or_default(),
        "phone": contact.phone.as_deref().unwrap_or_default(),
        "linkedinUrl": contact.linkedin_url.as_deref().unwrap_or_default(),
        "company": contact.company_name,
        "position": contact.title.as_deref().unwrap_or_default(),
        "custom1": contact.persona_type.as_deref().unwrap_or_default(),
        "custom2": contact.siren,
    })
}
