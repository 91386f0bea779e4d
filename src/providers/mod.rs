//! Collaborator contracts for the external services, and their HTTP adapters

pub mod captely;
pub mod claude;
pub mod csv_export;
pub mod emelia;
pub mod enrich_crm;
pub mod http;
pub mod pappers;
pub mod phantombuster;
pub mod sheets;

use crate::core::{
    config::{LeadflowConfig, SearchFilters},
    Company, Contact, Employee, EnrichmentRequest, EnrichmentResult,
};
use crate::execution::RateLimiter;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub use crate::execution::poller::{JobProvider, JobStatusReport};

/// Errors raised by provider adapters
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {provider}: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("{provider} did not answer in time")]
    Timeout { provider: &'static str },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ProviderError {
    /// A failed request, keeping timeouts apart from other transport errors
    pub fn request(provider: &'static str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ProviderError::Timeout { provider }
        } else {
            ProviderError::Http(error)
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout { .. })
    }

    pub fn decode(provider: &'static str, message: impl Into<String>) -> Self {
        ProviderError::Decode {
            provider,
            message: message.into(),
        }
    }
}

/// Company registry search
#[async_trait]
pub trait CompanySource: Send + Sync {
    async fn search(
        &self,
        filters: &SearchFilters,
        max_results: Option<usize>,
    ) -> Result<Vec<Company>, ProviderError>;
}

/// Resolves a company's LinkedIn page
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, company: &Company) -> Result<Option<String>, ProviderError>;
}

/// Scrapes employees from a company's LinkedIn page, one job per company
pub trait EmployeeExtractor: JobProvider<Request = Company, Record = Employee> {}

/// Picks the decision makers among a company's employees
#[async_trait]
pub trait DecisionMakerFilter: Send + Sync {
    async fn filter(
        &self,
        candidates: &[Employee],
        company_name: &str,
    ) -> Result<Vec<Contact>, ProviderError>;
}

/// Finds emails and phones, in bulk or one person at a time
#[async_trait]
pub trait ContactEnricher:
    JobProvider<Request = Vec<EnrichmentRequest>, Record = EnrichmentResult>
{
    async fn enrich_one(
        &self,
        request: &EnrichmentRequest,
    ) -> Result<EnrichmentResult, ProviderError>;
}

pub trait CompanyExport: Send + Sync {
    fn export_companies(&self, companies: &[Company]) -> Result<PathBuf, ProviderError>;
}

pub trait ContactExport: Send + Sync {
    fn export_contacts(&self, contacts: &[Contact]) -> Result<PathBuf, ProviderError>;
}

#[async_trait]
pub trait SpreadsheetSink: Send + Sync {
    async fn sync_companies(&self, companies: &[Company]) -> Result<usize, ProviderError>;
    async fn sync_contacts(&self, contacts: &[Contact]) -> Result<usize, ProviderError>;
}

/// Outcome of pushing contacts to a campaign
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub pushed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[async_trait]
pub trait CampaignSink: Send + Sync {
    async fn push(&self, contacts: &[Contact]) -> Result<PushReport, ProviderError>;
}

/// Every collaborator a run needs
#[derive(Clone)]
pub struct ProviderSet {
    pub companies: Arc<dyn CompanySource>,
    pub resolver: Arc<dyn IdentityResolver>,
    pub extractor: Arc<dyn EmployeeExtractor>,
    pub filter: Arc<dyn DecisionMakerFilter>,
    pub enricher: Arc<dyn ContactEnricher>,
    pub company_export: Arc<dyn CompanyExport>,
    pub contact_export: Arc<dyn ContactExport>,
    pub spreadsheet: Option<Arc<dyn SpreadsheetSink>>,
    pub campaign: Option<Arc<dyn CampaignSink>>,
}

impl ProviderSet {
    /// Build the HTTP-backed adapters described by `config`
    pub fn from_config(config: &LeadflowConfig) -> Result<Self, ProviderError> {
        let client = http::HttpClient::new(&config.http)?;
        let limiter = |per_minute: usize| Arc::new(RateLimiter::per_minute(per_minute));

        let exporter = Arc::new(csv_export::CsvExporter::new(&config.run.output_dir));

        let spreadsheet = match &config.sheets {
            Some(settings) => Some(Arc::new(sheets::SheetsClient::new(
                client.clone(),
                settings.clone(),
                limiter(settings.rate_limit_per_minute),
            )) as Arc<dyn SpreadsheetSink>),
            None => None,
        };
        let campaign = match &config.emelia {
            Some(settings) => Some(Arc::new(emelia::EmeliaClient::new(
                client.clone(),
                settings.clone(),
                limiter(settings.rate_limit_per_minute),
            )) as Arc<dyn CampaignSink>),
            None => None,
        };

        Ok(Self {
            companies: Arc::new(pappers::PappersClient::new(
                client.clone(),
                config.pappers.clone(),
                limiter(config.pappers.rate_limit_per_minute),
            )),
            resolver: Arc::new(enrich_crm::EnrichCrmClient::new(
                client.clone(),
                config.enrich_crm.clone(),
                limiter(config.enrich_crm.rate_limit_per_minute),
            )),
            extractor: Arc::new(phantombuster::PhantombusterClient::new(
                client.clone(),
                config.phantombuster.clone(),
                limiter(config.phantombuster.rate_limit_per_minute),
            )),
            filter: Arc::new(claude::ClaudeFilter::new(
                client.clone(),
                config.claude.clone(),
                limiter(config.claude.rate_limit_per_minute),
            )),
            enricher: Arc::new(captely::CaptelyClient::new(
                client,
                config.captely.clone(),
                limiter(config.captely.rate_limit_per_minute),
            )),
            company_export: exporter.clone(),
            contact_export: exporter,
            spreadsheet,
            campaign,
        })
    }
}
