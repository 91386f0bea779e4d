//! Stage definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// One stage of the lead pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CompanySearch,
    LinkedinResolution,
    CompanyExport,
    EmployeeExtraction,
    DecisionMakerFilter,
    ContactEnrichment,
    ContactExport,
    SpreadsheetSync,
    CampaignPush,
}

/// How a stage failure affects the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Failure halts the run
    Hard,
    /// Failure is reported and the run continues
    Soft,
}

impl Stage {
    /// Stages every run tracks
    pub const CORE: [Stage; 7] = [
        Stage::CompanySearch,
        Stage::LinkedinResolution,
        Stage::CompanyExport,
        Stage::EmployeeExtraction,
        Stage::DecisionMakerFilter,
        Stage::ContactEnrichment,
        Stage::ContactExport,
    ];

    /// Core stages followed by the optional sinks
    pub const ALL: [Stage; 9] = [
        Stage::CompanySearch,
        Stage::LinkedinResolution,
        Stage::CompanyExport,
        Stage::EmployeeExtraction,
        Stage::DecisionMakerFilter,
        Stage::ContactEnrichment,
        Stage::ContactExport,
        Stage::SpreadsheetSync,
        Stage::CampaignPush,
    ];

    /// 1-based position in the pipeline
    pub fn index(&self) -> usize {
        match self {
            Stage::CompanySearch => 1,
            Stage::LinkedinResolution => 2,
            Stage::CompanyExport => 3,
            Stage::EmployeeExtraction => 4,
            Stage::DecisionMakerFilter => 5,
            Stage::ContactEnrichment => 6,
            Stage::ContactExport => 7,
            Stage::SpreadsheetSync => 8,
            Stage::CampaignPush => 9,
        }
    }

    pub fn from_index(index: usize) -> Option<Stage> {
        Stage::ALL.get(index.checked_sub(1)?).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::CompanySearch => "Company search",
            Stage::LinkedinResolution => "LinkedIn resolution",
            Stage::CompanyExport => "Company export",
            Stage::EmployeeExtraction => "Employee extraction",
            Stage::DecisionMakerFilter => "Decision-maker filter",
            Stage::ContactEnrichment => "Contact enrichment",
            Stage::ContactExport => "Contact export",
            Stage::SpreadsheetSync => "Spreadsheet sync",
            Stage::CampaignPush => "Campaign push",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Stage::CompanySearch => "fetch target companies from the registry",
            Stage::LinkedinResolution => "resolve company LinkedIn pages",
            Stage::CompanyExport => "write companies to CSV",
            Stage::EmployeeExtraction => "scrape employees from LinkedIn pages",
            Stage::DecisionMakerFilter => "shortlist decision makers",
            Stage::ContactEnrichment => "find emails and phone numbers",
            Stage::ContactExport => "write enriched contacts to CSV",
            Stage::SpreadsheetSync => "sync companies and contacts to a spreadsheet",
            Stage::CampaignPush => "push contacts to an outreach campaign",
        }
    }

    pub fn failure_class(&self) -> FailureClass {
        match self {
            Stage::CompanyExport
            | Stage::ContactExport
            | Stage::SpreadsheetSync
            | Stage::CampaignPush => FailureClass::Soft,
            _ => FailureClass::Hard,
        }
    }

    /// Whether a zero result count counts as a failure
    ///
    /// LinkedIn resolution reports companies with a page but only fails on an
    /// empty company list; missing pages surface at employee extraction.
    pub fn empty_is_failure(&self) -> bool {
        matches!(
            self,
            Stage::CompanySearch | Stage::EmployeeExtraction | Stage::DecisionMakerFilter
        )
    }

    /// Optional sink stages that only exist when configured
    pub fn is_optional(&self) -> bool {
        matches!(self, Stage::SpreadsheetSync | Stage::CampaignPush)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.index(), self.name())
    }
}
