//! Company registry search (Pappers)

use crate::core::config::{PappersSettings, SearchFilters};
use crate::core::{Company, Leader};
use crate::execution::RateLimiter;
use crate::providers::http::{string_field, u64_field, HttpClient};
use crate::providers::{CompanySource, ProviderError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const PROVIDER: &str = "pappers";
const MAX_PAGE_SIZE: usize = 100;

pub struct PappersClient {
    http: HttpClient,
    settings: PappersSettings,
    limiter: Arc<RateLimiter>,
}

impl PappersClient {
    pub fn new(http: HttpClient, settings: PappersSettings, limiter: Arc<RateLimiter>) -> Self {
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
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::NotConfigured(PROVIDER))
    }

    fn page_size(&self) -> usize {
        self.settings.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    async fn search_page(
        &self,
        filters: &SearchFilters,
        page: usize,
    ) -> Result<(Vec<Company>, u64), ProviderError> {
        let mut query: Vec<(&str, String)> = vec![
            ("api_token", self.api_key()?.to_string()),
            ("par_page", self.page_size().to_string()),
            ("page", page.to_string()),
            ("entreprise_cessee", filters.include_ceased.to_string()),
        ];
        if let Some(v) = &filters.collective_agreement {
            query.push(("convention_collective", v.clone()));
        }
        if let Some(v) = &filters.headcount_bands {
            query.push(("tranche_effectif", v.clone()));
        }
        if let Some(v) = &filters.legal_categories {
            query.push(("categorie_juridique", v.clone()));
        }

        self.limiter.acquire().await;
        let url = format!("{}/recherche", self.settings.base_url);
        let body = self
            .http
            .json(PROVIDER, self.http.inner().get(url).query(&query))
            .await?;

        let companies = body
            .get("resultats")
            .and_then(Value::as_array)
            .map(|results| results.iter().filter_map(parse_company).collect())
            .unwrap_or_default();
        let total = u64_field(&body, "total").unwrap_or(0);
        Ok((companies, total))
    }

    /// Full company record, including its leaders
    pub async fn company_details(&self, siren: &str) -> Result<Company, ProviderError> {
        let query = [("api_token", self.api_key()?), ("siren", siren)];

        self.limiter.acquire().await;
        let url = format!("{}/entreprise", self.settings.base_url);
        let body = self
            .http
            .json(PROVIDER, self.http.inner().get(url).query(&query))
            .await?;

        parse_company(&body).ok_or_else(|| {
            ProviderError::decode(PROVIDER, format!("no SIREN in detail for {}", siren))
        })
    }
}

#[async_trait]
impl CompanySource for PappersClient {
    async fn search(
        &self,
        filters: &SearchFilters,
        max_results: Option<usize>,
    ) -> Result<Vec<Company>, ProviderError> {
        let page_size = self.page_size();
        let mut companies = Vec::new();
        let mut page = 1;

        'pages: loop {
            let (batch, total) = self.search_page(filters, page).await?;
            debug!("Registry page {}: {} results (total {})", page, batch.len(), total);
            if batch.is_empty() {
                break;
            }
            for company in batch {
                companies.push(company);
                if max_results.is_some_and(|max| companies.len() >= max) {
                    break 'pages;
                }
            }
            if (page * page_size) as u64 >= total {
                break;
            }
            page += 1;
        }
        info!("Registry search returned {} companies", companies.len());

        if !self.settings.fetch_details {
            return Ok(companies);
        }

        let mut detailed = Vec::with_capacity(companies.len());
        for company in companies {
            match self.company_details(&company.siren).await {
                Ok(details) => {
                    debug!("{}: {} leaders", details.name, details.leaders.len());
                    detailed.push(details);
                }
                Err(e) => {
                    warn!("Keeping summary record for {}: {}", company.name, e);
                    detailed.push(company);
                }
            }
        }
        Ok(detailed)
    }
}

/// Registry JSON to [`Company`]; records without a SIREN are dropped
pub fn parse_company(raw: &Value) -> Option<Company> {
    let siren = string_field(raw, "siren")?;
    let name = string_field(raw, "nom_entreprise")
        .or_else(|| string_field(raw, "denomination"))
        .unwrap_or_default();

    let mut company = Company::new(siren, name);
    company.siret = string_field(raw, "siret_siege")
        .or_else(|| raw.get("siege").and_then(|s| string_field(s, "siret")));
    company.legal_form = string_field(raw, "forme_juridique");
    company.headcount = string_field(raw, "effectif");
    company.headcount_band = string_field(raw, "tranche_effectif");
    company.created_on = string_field(raw, "date_creation");
    company.address = format_address(raw);
    company.naf_code = string_field(raw, "code_naf");
    company.activity = string_field(raw, "libelle_code_naf");
    company.collective_agreement = string_field(raw, "convention_collective");
    company.leaders = raw
        .get("representants")
        .and_then(Value::as_array)
        .map(|reps| reps.iter().filter_map(parse_leader).collect())
        .unwrap_or_default();
    Some(company)
}

fn format_address(raw: &Value) -> Option<String> {
    let siege = raw.get("siege")?;
    let parts: Vec<String> = ["adresse_ligne_1", "code_postal", "ville"]
        .iter()
        .filter_map(|key| string_field(siege, key))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Only representatives with a role are kept
fn parse_leader(rep: &Value) -> Option<Leader> {
    let role = string_field(rep, "qualite")?;
    let first = string_field(rep, "prenom").unwrap_or_default();
    let last = string_field(rep, "nom").unwrap_or_default();
    let name = format!("{} {}", first, last).trim().to_string();
    let name = if name.is_empty() {
        string_field(rep, "nom_complet").unwrap_or_default()
    } else {
        name
    };
    if name.is_empty() {
        return None;
    }
    Some(Leader {
        name,
        role,
        birth_date: string_field(rep, "date_de_naissance"),
    })
}
