//! Typed entity records accumulated across the run

use serde::{Deserialize, Serialize};

/// Persona assigned to contacts derived directly from registry leaders
pub const LEADER_PERSONA: &str = "Leader";

/// A company from the registry, identified by its SIREN
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub siren: String,
    pub name: String,
    #[serde(default)]
    pub siret: Option<String>,
    #[serde(default)]
    pub legal_form: Option<String>,
    #[serde(default)]
    pub headcount: Option<String>,
    #[serde(default)]
    pub headcount_band: Option<String>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub naf_code: Option<String>,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub collective_agreement: Option<String>,
    #[serde(default)]
    pub leaders: Vec<Leader>,
    /// Written by LinkedIn resolution
    #[serde(default)]
    pub linkedin_url: Option<String>,
}

impl Company {
    pub fn new(siren: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            siren: siren.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn has_linkedin(&self) -> bool {
        self.linkedin_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Leaders rendered as `name (role); name (role)`
    pub fn leaders_summary(&self) -> String {
        self.leaders
            .iter()
            .map(|l| format!("{} ({})", l.name, l.role))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Inverse of [`Company::leaders_summary`]
    pub fn parse_leaders(summary: &str) -> Vec<Leader> {
        summary
            .split(';')
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .filter_map(|chunk| {
                let open = chunk.rfind('(')?;
                let role = chunk[open + 1..].trim_end_matches(')').trim();
                let name = chunk[..open].trim();
                if name.is_empty() || role.is_empty() {
                    return None;
                }
                Some(Leader {
                    name: name.to_string(),
                    role: role.to_string(),
                    birth_date: None,
                })
            })
            .collect()
    }
}

/// A registered company officer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub birth_date: Option<String>,
}

/// An employee scraped from a company's LinkedIn page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub name: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub linkedin_url: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// A person the pipeline wants to reach
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub siren: String,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub persona_type: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub phone_type: Option<String>,
}

impl Contact {
    /// Contact derived from a registry leader
    pub fn from_leader(company: &Company, leader: &Leader) -> Self {
        Self {
            name: leader.name.clone(),
            title: Some(leader.role.clone()),
            persona_type: Some(LEADER_PERSONA.to_string()),
            ..Default::default()
        }
        .at_company(company)
    }

    /// Attach the owning company's identity
    pub fn at_company(mut self, company: &Company) -> Self {
        self.company_name = company.name.clone();
        self.siren = company.siren.clone();
        self
    }

    /// First and last name, falling back to splitting `name` on its first space
    pub fn split_name(&self) -> (String, String) {
        let first = self.first_name.as_deref().unwrap_or("").trim();
        let last = self.last_name.as_deref().unwrap_or("").trim();
        if !first.is_empty() && !last.is_empty() {
            return (first.to_string(), last.to_string());
        }

        let full = self.name.trim();
        match full.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.trim().to_string()),
            None => (full.to_string(), String::new()),
        }
    }

    /// Lowercased `first_last_company`, or `None` when a part is missing
    pub fn correlation_key(&self) -> Option<String> {
        let (first, last) = self.split_name();
        correlation_key(&first, &last, &self.company_name)
    }

    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Copy enrichment output onto this contact without erasing prior fields
    pub fn apply_enrichment(&mut self, result: &EnrichmentResult) {
        if let Some(email) = result.email.as_ref().filter(|e| !e.is_empty()) {
            self.email = Some(email.clone());
        }
        self.email_verified = self.email_verified || result.email_verified;
        if let Some(phone) = result.phone.as_ref().filter(|p| !p.is_empty()) {
            self.phone = Some(phone.clone());
        }
        if result.phone_type.is_some() {
            self.phone_type = result.phone_type.clone();
        }
    }

    pub fn enrichment_request(&self) -> Option<EnrichmentRequest> {
        let (first_name, last_name) = self.split_name();
        if first_name.is_empty() || last_name.is_empty() || self.company_name.is_empty() {
            return None;
        }
        Some(EnrichmentRequest {
            first_name,
            last_name,
            company: self.company_name.clone(),
            linkedin_url: self.linkedin_url.clone().filter(|u| !u.is_empty()),
        })
    }
}

/// Composite person key used to match enrichment output back to contacts
pub fn correlation_key(first: &str, last: &str, company: &str) -> Option<String> {
    let (first, last, company) = (first.trim(), last.trim(), company.trim());
    if first.is_empty() || last.is_empty() || company.is_empty() {
        return None;
    }
    Some(format!("{}_{}_{}", first, last, company).to_lowercase())
}

/// One person submitted for enrichment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
}

impl EnrichmentRequest {
    pub fn key(&self) -> Option<String> {
        correlation_key(&self.first_name, &self.last_name, &self.company)
    }
}

/// Enrichment output for one person
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub email_verified: bool,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub phone_type: Option<String>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl EnrichmentResult {
    pub fn key(&self) -> Option<String> {
        correlation_key(&self.first_name, &self.last_name, &self.company)
    }
}
