//! Shared HTTP client and JSON helpers for the adapters

use crate::core::config::HttpSettings;
use crate::providers::ProviderError;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

const MAX_ERROR_BODY: usize = 200;

/// One connection pool shared by every adapter
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, ProviderError> {
        let inner = Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(Self { inner })
    }

    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Send a request and decode a JSON body; non-2xx answers become errors
    pub async fn json(
        &self,
        provider: &'static str,
        request: RequestBuilder,
    ) -> Result<Value, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::request(provider, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider,
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::decode(provider, e.to_string()))
    }

    /// Send a request whose body is not needed
    pub async fn send(
        &self,
        provider: &'static str,
        request: RequestBuilder,
    ) -> Result<(), ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::request(provider, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider,
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }
        Ok(())
    }
}

fn truncate(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}

/// Follow a key path through nested objects
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

/// First non-empty string found among several key paths
pub fn first_str<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// String field, also accepting numbers (providers are loose about ids and counts)
pub fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Unsigned integer field, also accepting numeric strings
pub fn u64_field(value: &Value, key: &str) -> Option<u64> {
    match value.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
