//! Contact enrichment (Captely), bulk jobs with a one-by-one endpoint

use crate::core::config::CaptelySettings;
use crate::core::{EnrichmentRequest, EnrichmentResult};
use crate::execution::RateLimiter;
use crate::providers::http::{string_field, u64_field, HttpClient};
use crate::providers::{ContactEnricher, JobProvider, JobStatusReport, ProviderError};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const PROVIDER: &str = "captely";

pub struct CaptelyClient {
    http: HttpClient,
    settings: CaptelySettings,
    limiter: Arc<RateLimiter>,
}

impl CaptelyClient {
    pub fn new(http: HttpClient, settings: CaptelySettings, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http,
            settings,
            limiter,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ProviderError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured(PROVIDER))?;
        Ok(request
            .header("X-API-Key", api_key)
            .header("Accept", "application/json"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url, path)
    }
}

#[async_trait]
impl JobProvider for CaptelyClient {
    type Request = Vec<EnrichmentRequest>;
    type Record = EnrichmentResult;

    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn submit(
        &self,
        requests: &Vec<EnrichmentRequest>,
    ) -> Result<Option<String>, ProviderError> {
        let payload = json!({
            "contacts": requests,
            "enrich_email": true,
            "enrich_phone": self.settings.enrich_phone,
        });
        let request = self.authorized(self.http.inner().post(self.url("enrich/bulk")))?;

        self.limiter.acquire().await;
        let body = self.http.json(PROVIDER, request.json(&payload)).await?;
        Ok(parse_job_id(&body))
    }

    async fn status(&self, job_id: &str) -> Result<JobStatusReport, ProviderError> {
        let request = self.authorized(
            self.http
                .inner()
                .get(self.url(&format!("enrich/status/{}", job_id))),
        )?;

        self.limiter.acquire().await;
        let body = self.http.json(PROVIDER, request).await?;
        Ok(JobStatusReport {
            status: string_field(&body, "status").unwrap_or_else(|| "unknown".to_string()),
            progress: u64_field(&body, "progress"),
            total: u64_field(&body, "total"),
            error: string_field(&body, "error"),
        })
    }

    async fn fetch_page(
        &self,
        job_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<EnrichmentResult>, ProviderError> {
        let request = self.authorized(
            self.http
                .inner()
                .get(self.url(&format!("enrich/results/{}", job_id)))
                .query(&[("page", page), ("per_page", page_size)]),
        )?;

        self.limiter.acquire().await;
        let body = self.http.json(PROVIDER, request).await?;
        Ok(parse_results(&body))
    }
}

#[async_trait]
impl ContactEnricher for CaptelyClient {
    async fn enrich_one(
        &self,
        request: &EnrichmentRequest,
    ) -> Result<EnrichmentResult, ProviderError> {
        let mut payload = json!({
            "first_name": request.first_name,
            "last_name": request.last_name,
            "company": request.company,
            "enrich_email": true,
            "enrich_phone": self.settings.enrich_phone,
            "idempotency_key": Uuid::new_v4().to_string(),
        });
        if let Some(url) = &request.linkedin_url {
            payload["linkedin_url"] = json!(url);
        }
        let builder = self.authorized(self.http.inner().post(self.url("enrich")))?;

        self.limiter.acquire().await;
        let body = self.http.json(PROVIDER, builder.json(&payload)).await?;
        let result = parse_single(&body, request);
        debug!(
            "Enriched {} {}: email={}",
            request.first_name,
            request.last_name,
            result.email.is_some()
        );
        Ok(result)
    }
}

/// Job id under `job_id`, `jobId` or `id`
pub fn parse_job_id(body: &Value) -> Option<String> {
    ["job_id", "jobId", "id"]
        .iter()
        .find_map(|key| string_field(body, key))
}

/// Results under `contacts`, `results` or `data`; malformed entries are skipped
pub fn parse_results(body: &Value) -> Vec<EnrichmentResult> {
    ["contacts", "results", "data"]
        .iter()
        .filter_map(|key| body.get(key).and_then(Value::as_array))
        .find(|items| !items.is_empty())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Single answer; identity fields fall back to the request's
fn parse_single(body: &Value, request: &EnrichmentRequest) -> EnrichmentResult {
    let payload = body.get("data").filter(|d| d.is_object()).unwrap_or(body);
    let mut result: EnrichmentResult =
        serde_json::from_value(payload.clone()).unwrap_or_default();
    if result.first_name.is_empty() {
        result.first_name = request.first_name.clone();
    }
    if result.last_name.is_empty() {
        result.last_name = request.last_name.clone();
    }
    if result.company.is_empty() {
        result.company = request.company.clone();
    }
    result
}
