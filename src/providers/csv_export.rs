//! CSV files for companies and enriched contacts

use crate::core::{Company, Contact};
use crate::providers::{CompanyExport, ContactExport, ProviderError};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const COMPANIES_FILE: &str = "companies.csv";

/// Writes CSV exports into one output directory
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompanyRow {
    siren: String,
    #[serde(default)]
    siret: String,
    name: String,
    #[serde(default)]
    legal_form: String,
    #[serde(default)]
    headcount: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    naf_code: String,
    #[serde(default)]
    activity: String,
    #[serde(default)]
    collective_agreement: String,
    #[serde(default)]
    linkedin_url: String,
    #[serde(default)]
    leaders: String,
}

impl From<&Company> for CompanyRow {
    fn from(c: &Company) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            siren: c.siren.clone(),
            siret: text(&c.siret),
            name: c.name.clone(),
            legal_form: text(&c.legal_form),
            headcount: text(&c.headcount),
            address: text(&c.address),
            naf_code: text(&c.naf_code),
            activity: text(&c.activity),
            collective_agreement: text(&c.collective_agreement),
            linkedin_url: text(&c.linkedin_url),
            leaders: c.leaders_summary(),
        }
    }
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        let opt = |v: String| if v.trim().is_empty() { None } else { Some(v) };
        Company {
            leaders: Company::parse_leaders(&row.leaders),
            siren: row.siren,
            name: row.name,
            siret: opt(row.siret),
            legal_form: opt(row.legal_form),
            headcount: opt(row.headcount),
            address: opt(row.address),
            naf_code: opt(row.naf_code),
            activity: opt(row.activity),
            collective_agreement: opt(row.collective_agreement),
            linkedin_url: opt(row.linkedin_url),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct ContactRow<'a> {
    first_name: String,
    last_name: String,
    full_name: &'a str,
    title: &'a str,
    company: &'a str,
    linkedin_url: &'a str,
    email: &'a str,
    email_verified: bool,
    phone: &'a str,
    persona_type: &'a str,
    siren: &'a str,
}

impl<'a> From<&'a Contact> for ContactRow<'a> {
    fn from(c: &'a Contact) -> Self {
        let (first_name, last_name) = c.split_name();
        Self {
            first_name,
            last_name,
            full_name: &c.name,
            title: c.title.as_deref().unwrap_or_default(),
            company: &c.company_name,
            linkedin_url: c.linkedin_url.as_deref().unwrap_or_default(),
            email: c.email.as_deref().unwrap_or_default(),
            email_verified: c.email_verified,
            phone: c.phone.as_deref().unwrap_or_default(),
            persona_type: c.persona_type.as_deref().unwrap_or_default(),
            siren: &c.siren,
        }
    }
}

impl CsvExporter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write companies to `path`
    pub fn write_companies(path: &Path, companies: &[Company]) -> Result<(), ProviderError> {
        let mut writer = csv::Writer::from_path(path)?;
        for company in companies {
            writer.serialize(CompanyRow::from(company))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write contacts to `path`
    pub fn write_contacts(path: &Path, contacts: &[Contact]) -> Result<(), ProviderError> {
        let mut writer = csv::Writer::from_path(path)?;
        for contact in contacts {
            writer.serialize(ContactRow::from(contact))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Load companies from a file written by [`CsvExporter::write_companies`]
pub fn read_companies(path: &Path) -> Result<Vec<Company>, ProviderError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut companies = Vec::new();
    for row in reader.deserialize::<CompanyRow>() {
        companies.push(Company::from(row?));
    }
    Ok(companies)
}

impl CompanyExport for CsvExporter {
    fn export_companies(&self, companies: &[Company]) -> Result<PathBuf, ProviderError> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(COMPANIES_FILE);
        Self::write_companies(&path, companies)?;
        info!("Exported {} companies to {}", companies.len(), path.display());
        Ok(path)
    }
}

impl ContactExport for CsvExporter {
    fn export_contacts(&self, contacts: &[Contact]) -> Result<PathBuf, ProviderError> {
        fs::create_dir_all(&self.output_dir)?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .output_dir
            .join(format!("enriched_contacts_{}.csv", timestamp));
        Self::write_contacts(&path, contacts)?;
        info!("Exported {} contacts to {}", contacts.len(), path.display());
        Ok(path)
    }
}
