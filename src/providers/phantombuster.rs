//! Employee extraction jobs (Phantombuster)

use crate::core::config::PhantombusterSettings;
use crate::core::{Company, Employee};
use crate::execution::RateLimiter;
use crate::providers::http::{first_str, string_field, HttpClient};
use crate::providers::{EmployeeExtractor, JobProvider, JobStatusReport, ProviderError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const PROVIDER: &str = "phantombuster";

pub struct PhantombusterClient {
    http: HttpClient,
    settings: PhantombusterSettings,
    limiter: Arc<RateLimiter>,
}

impl PhantombusterClient {
    pub fn new(
        http: HttpClient,
        settings: PhantombusterSettings,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            http,
            settings,
            limiter,
        }
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.settings
            .api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured(PROVIDER))
    }

    async fn get(&self, path: &str, job_id: &str) -> Result<Value, ProviderError> {
        let api_key = self.api_key()?;
        self.limiter.acquire().await;
        let url = format!("{}/{}", self.settings.base_url, path);
        self.http
            .json(
                PROVIDER,
                self.http
                    .inner()
                    .get(url)
                    .header("X-Phantombuster-Key", api_key)
                    .query(&[("id", job_id)]),
            )
            .await
    }
}

#[async_trait]
impl JobProvider for PhantombusterClient {
    type Request = Company;
    type Record = Employee;

    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn submit(&self, company: &Company) -> Result<Option<String>, ProviderError> {
        let api_key = self.api_key()?;
        let agent_id = self
            .settings
            .agent_id
            .as_deref()
            .ok_or(ProviderError::NotConfigured("phantombuster agent"))?;
        let linkedin_url = company.linkedin_url.as_deref().ok_or_else(|| {
            ProviderError::decode(PROVIDER, format!("{} has no LinkedIn URL", company.name))
        })?;

        let payload = json!({
            "id": agent_id,
            "argument": {
                "spreadsheetUrl": linkedin_url,
                "numberOfEmployeesToExtract": self.settings.employees_per_company,
            },
        });

        self.limiter.acquire().await;
        let url = format!("{}/agents/launch", self.settings.base_url);
        let body = self
            .http
            .json(
                PROVIDER,
                self.http
                    .inner()
                    .post(url)
                    .header("X-Phantombuster-Key", api_key)
                    .json(&payload),
            )
            .await?;
        Ok(string_field(&body, "containerId"))
    }

    async fn status(&self, job_id: &str) -> Result<JobStatusReport, ProviderError> {
        let body = self.get("containers/fetch", job_id).await?;
        Ok(parse_container_status(&body))
    }

    async fn fetch_page(
        &self,
        job_id: &str,
        page: usize,
        _page_size: usize,
    ) -> Result<Vec<Employee>, ProviderError> {
        // the result object is not paginated
        if page > 1 {
            return Ok(Vec::new());
        }
        let body = self.get("containers/fetch-result-object", job_id).await?;
        let result = match body.get("resultObject") {
            Some(Value::String(raw)) => serde_json::from_str(raw)
                .map_err(|e| ProviderError::decode(PROVIDER, e.to_string()))?,
            Some(value) => value.clone(),
            None => Value::Null,
        };
        let mut employees = parse_employees(&result);
        employees.truncate(self.settings.employees_per_company);
        Ok(employees)
    }
}

impl EmployeeExtractor for PhantombusterClient {}

/// A finished container with a non-zero exit code counts as failed
pub fn parse_container_status(body: &Value) -> JobStatusReport {
    let status = string_field(body, "status").unwrap_or_else(|| "unknown".to_string());
    let exit_code = body.get("exitCode").and_then(Value::as_i64);

    match exit_code {
        Some(code) if code != 0 && status == "finished" => JobStatusReport {
            status: "failed".to_string(),
            error: Some(format!("container exited with code {}", code)),
            ..Default::default()
        },
        _ => JobStatusReport::new(status),
    }
}

/// Scraped profiles; entries without a profile URL are dropped
pub fn parse_employees(result: &Value) -> Vec<Employee> {
    let entries = match result {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) => result
            .get("employees")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };

    entries
        .iter()
        .filter_map(|entry| {
            let linkedin_url = first_str(entry, &[&["profileUrl"], &["linkedInProfileUrl"]])?;
            let name = first_str(entry, &[&["name"], &["fullName"]])
                .unwrap_or_default()
                .to_string();
            Some(Employee {
                name,
                first_name: string_field(entry, "firstName"),
                last_name: string_field(entry, "lastName"),
                title: first_str(entry, &[&["job"], &["title"], &["headline"]]).map(str::to_string),
                linkedin_url: linkedin_url.to_string(),
                location: string_field(entry, "location"),
            })
        })
        .collect()
}
