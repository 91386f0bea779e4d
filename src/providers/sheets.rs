//! Spreadsheet sync through the Google Sheets values API

use crate::core::config::SheetsSettings;
use crate::core::{Company, Contact};
use crate::execution::RateLimiter;
use crate::providers::http::HttpClient;
use crate::providers::{ProviderError, SpreadsheetSink};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const PROVIDER: &str = "sheets";

const COMPANY_HEADERS: [&str; 10] = [
    "siren",
    "name",
    "legal_form",
    "headcount",
    "address",
    "naf_code",
    "activity",
    "linkedin_url",
    "collective_agreement",
    "leaders",
];

const CONTACT_HEADERS: [&str; 10] = [
    "name",
    "title",
    "company",
    "siren",
    "persona_type",
    "linkedin_url",
    "email",
    "email_verified",
    "phone",
    "phone_type",
];

pub struct SheetsClient {
    http: HttpClient,
    settings: SheetsSettings,
    limiter: Arc<RateLimiter>,
}

impl SheetsClient {
    pub fn new(http: HttpClient, settings: SheetsSettings, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http,
            settings,
            limiter,
        }
    }

    fn credentials(&self) -> Result<(&str, &str), ProviderError> {
        let token = self
            .settings
            .access_token
            .as_deref()
            .ok_or(ProviderError::NotConfigured("sheets access token"))?;
        let spreadsheet = self
            .settings
            .spreadsheet_id
            .as_deref()
            .ok_or(ProviderError::NotConfigured("sheets spreadsheet id"))?;
        Ok((token, spreadsheet))
    }

    /// Clear a worksheet and write `rows` (header first) into it
    async fn replace_worksheet(
        &self,
        worksheet: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), ProviderError> {
        let (token, spreadsheet) = self.credentials()?;
        let base = format!(
            "{}/spreadsheets/{}/values/{}",
            self.settings.base_url, spreadsheet, worksheet
        );

        self.limiter.acquire().await;
        self.http
            .send(
                PROVIDER,
                self.http
                    .inner()
                    .post(format!("{}:clear", base))
                    .bearer_auth(token)
                    .json(&json!({})),
            )
            .await?;

        self.limiter.acquire().await;
        self.http
            .send(
                PROVIDER,
                self.http
                    .inner()
                    .put(&base)
                    .bearer_auth(token)
                    .query(&[("valueInputOption", "USER_ENTERED")])
                    .json(&json!({
                        "range": worksheet,
                        "majorDimension": "ROWS",
                        "values": rows,
                    })),
            )
            .await
    }
}

#[async_trait]
impl SpreadsheetSink for SheetsClient {
    async fn sync_companies(&self, companies: &[Company]) -> Result<usize, ProviderError> {
        self.replace_worksheet(&self.settings.companies_worksheet, company_rows(companies))
            .await?;
        info!("Synced {} companies to spreadsheet", companies.len());
        Ok(companies.len())
    }

    async fn sync_contacts(&self, contacts: &[Contact]) -> Result<usize, ProviderError> {
        self.replace_worksheet(&self.settings.contacts_worksheet, contact_rows(contacts))
            .await?;
        info!("Synced {} contacts to spreadsheet", contacts.len());
        Ok(contacts.len())
    }
}

fn header(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

pub fn company_rows(companies: &[Company]) -> Vec<Vec<String>> {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    std::iter::once(header(&COMPANY_HEADERS))
        .chain(companies.iter().map(|c| {
            vec![
                c.siren.clone(),
                c.name.clone(),
                text(&c.legal_form),
                text(&c.headcount),
                text(&c.address),
                text(&c.naf_code),
                text(&c.activity),
                text(&c.linkedin_url),
                text(&c.collective_agreement),
                c.leaders_summary(),
            ]
        }))
        .collect()
}

pub fn contact_rows(contacts: &[Contact]) -> Vec<Vec<String>> {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    std::iter::once(header(&CONTACT_HEADERS))
        .chain(contacts.iter().map(|c| {
            vec![
                c.name.clone(),
                text(&c.title),
                c.company_name.clone(),
                c.siren.clone(),
                text(&c.persona_type),
                text(&c.linkedin_url),
                text(&c.email),
                c.email_verified.to_string(),
                text(&c.phone),
                text(&c.phone_type),
            ]
        }))
        .collect()
}
