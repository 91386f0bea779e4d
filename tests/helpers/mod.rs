//! In-memory providers and assertions for pipeline tests

#![allow(dead_code)]

use async_trait::async_trait;
use leadflow::core::config::SearchFilters;
use leadflow::core::{
    Company, Contact, Employee, EnrichmentRequest, EnrichmentResult, Leader, PipelineContext,
    Stage, StepStatus,
};
use leadflow::execution::{Orchestrator, PipelineEvent, PollConfig, RunOptions};
use leadflow::providers::csv_export::CsvExporter;
use leadflow::providers::{
    CampaignSink, CompanySource, ContactEnricher, DecisionMakerFilter, EmployeeExtractor,
    IdentityResolver, JobProvider, JobStatusReport, ProviderError, ProviderSet, PushReport,
    SpreadsheetSink,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const FIRST_NAMES: [&str; 4] = ["Alice", "Bruno", "Chloe", "David"];

/// Company with `leaders` registry officers and no LinkedIn page yet
pub fn company(siren: &str, name: &str, leaders: usize) -> Company {
    let mut company = Company::new(siren, name);
    company.leaders = (0..leaders)
        .map(|i| Leader {
            name: format!("{} Dupont", FIRST_NAMES[i % FIRST_NAMES.len()]),
            role: "Président".to_string(),
            birth_date: None,
        })
        .collect();
    company
}

/// `n` companies named `Company 1..=n`, each with `leaders` officers
pub fn companies(n: usize, leaders: usize) -> Vec<Company> {
    (1..=n)
        .map(|i| company(&format!("10000000{}", i), &format!("Company {}", i), leaders))
        .collect()
}

pub fn employees_for(siren: &str, n: usize) -> Vec<Employee> {
    (0..n)
        .map(|i| {
            let first = FIRST_NAMES[i % FIRST_NAMES.len()];
            let last = format!("Staff{}", i);
            Employee {
                name: format!("{} {}", first, last),
                first_name: Some(first.to_string()),
                last_name: Some(last),
                title: Some("Directeur".to_string()),
                linkedin_url: format!("https://www.linkedin.com/in/{}-{}", siren, i),
                location: None,
            }
        })
        .collect()
}

/// Registry search returning a fixed list
pub struct FakeCompanies {
    pub companies: Vec<Company>,
    pub error: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeCompanies {
    pub fn new(companies: Vec<Company>) -> Self {
        Self {
            companies,
            error: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CompanySource for FakeCompanies {
    async fn search(
        &self,
        _filters: &SearchFilters,
        max_results: Option<usize>,
    ) -> Result<Vec<Company>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.error {
            return Err(ProviderError::Transport(error.clone()));
        }
        let limit = max_results.unwrap_or(usize::MAX);
        Ok(self.companies.iter().take(limit).cloned().collect())
    }
}

/// Resolves every company to a page derived from its SIREN unless listed otherwise
#[derive(Default)]
pub struct FakeResolver {
    pub missing: HashSet<String>,
    pub failing: HashSet<String>,
}

#[async_trait]
impl IdentityResolver for FakeResolver {
    async fn resolve(&self, company: &Company) -> Result<Option<String>, ProviderError> {
        if self.failing.contains(&company.siren) {
            return Err(ProviderError::Transport("lookup failed".to_string()));
        }
        if self.missing.contains(&company.siren) {
            return Ok(None);
        }
        Ok(Some(format!(
            "https://www.linkedin.com/company/{}",
            company.siren
        )))
    }
}

/// One job per company; jobs for `failing` SIRENs end in "failed"
pub struct FakeExtractor {
    pub per_company: usize,
    pub failing: HashSet<String>,
    pub submissions: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn new(per_company: usize) -> Self {
        Self {
            per_company,
            failing: HashSet::new(),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn submitted(&self) -> Vec<String> {
        let mut sirens = self.submissions.lock().unwrap().clone();
        sirens.sort();
        sirens
    }
}

#[async_trait]
impl JobProvider for FakeExtractor {
    type Request = Company;
    type Record = Employee;

    fn name(&self) -> &'static str {
        "fake-extractor"
    }

    async fn submit(&self, company: &Company) -> Result<Option<String>, ProviderError> {
        self.submissions.lock().unwrap().push(company.siren.clone());
        Ok(Some(format!("job-{}", company.siren)))
    }

    async fn status(&self, job_id: &str) -> Result<JobStatusReport, ProviderError> {
        let siren = job_id.trim_start_matches("job-");
        if self.failing.contains(siren) {
            Ok(JobStatusReport {
                status: "failed".to_string(),
                error: Some("agent crashed".to_string()),
                ..Default::default()
            })
        } else {
            Ok(JobStatusReport::new("finished"))
        }
    }

    async fn fetch_page(
        &self,
        job_id: &str,
        page: usize,
        _page_size: usize,
    ) -> Result<Vec<Employee>, ProviderError> {
        if page > 1 {
            return Ok(Vec::new());
        }
        Ok(employees_for(job_id.trim_start_matches("job-"), self.per_company))
    }
}

impl EmployeeExtractor for FakeExtractor {}

/// Keeps the first `per_company` candidates
pub struct FakeFilter {
    pub per_company: usize,
    pub failing: HashSet<String>,
}

impl FakeFilter {
    pub fn new(per_company: usize) -> Self {
        Self {
            per_company,
            failing: HashSet::new(),
        }
    }
}

#[async_trait]
impl DecisionMakerFilter for FakeFilter {
    async fn filter(
        &self,
        candidates: &[Employee],
        company_name: &str,
    ) -> Result<Vec<Contact>, ProviderError> {
        if self.failing.contains(company_name) {
            return Err(ProviderError::Transport("model unavailable".to_string()));
        }
        Ok(candidates
            .iter()
            .take(self.per_company)
            .map(|e| Contact {
                name: e.name.clone(),
                first_name: e.first_name.clone(),
                last_name: e.last_name.clone(),
                title: e.title.clone(),
                linkedin_url: Some(e.linkedin_url.clone()),
                persona_type: Some("CEO".to_string()),
                ..Default::default()
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMode {
    /// Job id returned, job ends with the given status
    Job(&'static str),
    /// Submission answers without a job id
    NoJobId,
}

/// Finds `first.last@company` for everyone it is asked about
pub struct FakeEnricher {
    pub mode: BulkMode,
    pub bulk_submissions: AtomicUsize,
    pub submitted: Mutex<Vec<EnrichmentRequest>>,
    pub unitary: Mutex<Vec<EnrichmentRequest>>,
}

impl FakeEnricher {
    pub fn new(mode: BulkMode) -> Self {
        Self {
            mode,
            bulk_submissions: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
            unitary: Mutex::new(Vec::new()),
        }
    }

    fn answer(request: &EnrichmentRequest) -> EnrichmentResult {
        EnrichmentResult {
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            company: request.company.clone(),
            email: Some(
                format!(
                    "{}.{}@{}.fr",
                    request.first_name,
                    request.last_name,
                    request.company.replace(' ', "")
                )
                .to_lowercase(),
            ),
            email_verified: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl JobProvider for FakeEnricher {
    type Request = Vec<EnrichmentRequest>;
    type Record = EnrichmentResult;

    fn name(&self) -> &'static str {
        "fake-enricher"
    }

    async fn submit(
        &self,
        requests: &Vec<EnrichmentRequest>,
    ) -> Result<Option<String>, ProviderError> {
        self.bulk_submissions.fetch_add(1, Ordering::SeqCst);
        *self.submitted.lock().unwrap() = requests.clone();
        match self.mode {
            BulkMode::Job(_) => Ok(Some("bulk-1".to_string())),
            BulkMode::NoJobId => Ok(None),
        }
    }

    async fn status(&self, _job_id: &str) -> Result<JobStatusReport, ProviderError> {
        match self.mode {
            BulkMode::Job(status) => Ok(JobStatusReport::new(status)),
            BulkMode::NoJobId => Ok(JobStatusReport::new("unknown")),
        }
    }

    async fn fetch_page(
        &self,
        _job_id: &str,
        page: usize,
        _page_size: usize,
    ) -> Result<Vec<EnrichmentResult>, ProviderError> {
        if page > 1 {
            return Ok(Vec::new());
        }
        Ok(self
            .submitted
            .lock()
            .unwrap()
            .iter()
            .map(Self::answer)
            .collect())
    }
}

#[async_trait]
impl ContactEnricher for FakeEnricher {
    async fn enrich_one(
        &self,
        request: &EnrichmentRequest,
    ) -> Result<EnrichmentResult, ProviderError> {
        self.unitary.lock().unwrap().push(request.clone());
        Ok(Self::answer(request))
    }
}

/// Spreadsheet sink counting what it receives
#[derive(Default)]
pub struct RecordingSheet {
    pub fail: bool,
    /// Answer every sync with a request timeout
    pub timeout: bool,
    pub companies: AtomicUsize,
    pub contacts: AtomicUsize,
}

#[async_trait]
impl SpreadsheetSink for RecordingSheet {
    async fn sync_companies(&self, companies: &[Company]) -> Result<usize, ProviderError> {
        if self.timeout {
            return Err(ProviderError::Timeout { provider: "sheets" });
        }
        if self.fail {
            return Err(ProviderError::Status {
                provider: "sheets",
                status: 403,
                body: "forbidden".to_string(),
            });
        }
        self.companies.store(companies.len(), Ordering::SeqCst);
        Ok(companies.len())
    }

    async fn sync_contacts(&self, contacts: &[Contact]) -> Result<usize, ProviderError> {
        self.contacts.store(contacts.len(), Ordering::SeqCst);
        Ok(contacts.len())
    }
}

/// Campaign sink keeping the pushed contacts
#[derive(Default)]
pub struct RecordingCampaign {
    pub pushed: Mutex<Vec<Contact>>,
}

#[async_trait]
impl CampaignSink for RecordingCampaign {
    async fn push(&self, contacts: &[Contact]) -> Result<PushReport, ProviderError> {
        self.pushed.lock().unwrap().extend_from_slice(contacts);
        Ok(PushReport {
            pushed: contacts.len(),
            ..Default::default()
        })
    }
}

/// A full set of fakes writing CSV files into a temporary directory
pub struct Fakes {
    pub companies: Arc<FakeCompanies>,
    pub resolver: Arc<FakeResolver>,
    pub extractor: Arc<FakeExtractor>,
    pub filter: Arc<FakeFilter>,
    pub enricher: Arc<FakeEnricher>,
    pub sheet: Option<Arc<RecordingSheet>>,
    pub campaign: Option<Arc<RecordingCampaign>>,
    pub output: TempDir,
}

impl Fakes {
    /// 4 employees per company, 2 decision makers each, bulk enrichment succeeds
    pub fn new(companies: Vec<Company>) -> Self {
        Self {
            companies: Arc::new(FakeCompanies::new(companies)),
            resolver: Arc::new(FakeResolver::default()),
            extractor: Arc::new(FakeExtractor::new(4)),
            filter: Arc::new(FakeFilter::new(2)),
            enricher: Arc::new(FakeEnricher::new(BulkMode::Job("completed"))),
            sheet: None,
            campaign: None,
            output: tempfile::tempdir().unwrap(),
        }
    }

    pub fn provider_set(&self) -> ProviderSet {
        let exporter = Arc::new(CsvExporter::new(self.output.path()));
        ProviderSet {
            companies: self.companies.clone(),
            resolver: self.resolver.clone(),
            extractor: self.extractor.clone(),
            filter: self.filter.clone(),
            enricher: self.enricher.clone(),
            company_export: exporter.clone(),
            contact_export: exporter,
            spreadsheet: self
                .sheet
                .clone()
                .map(|s| s as Arc<dyn SpreadsheetSink>),
            campaign: self
                .campaign
                .clone()
                .map(|c| c as Arc<dyn CampaignSink>),
        }
    }

    pub fn orchestrator(&self, options: RunOptions) -> Orchestrator {
        Orchestrator::new(self.provider_set(), options)
    }
}

/// Options with short polling so job-based stages finish quickly
pub fn test_options() -> RunOptions {
    let poll = PollConfig {
        timeout: Duration::from_secs(30),
        interval: Duration::from_millis(10),
        page_size: 100,
    };
    RunOptions {
        extraction_poll: poll,
        enrichment_poll: poll,
        ..Default::default()
    }
}

/// Collect every event the orchestrator emits
pub async fn record_events(orchestrator: &Orchestrator) -> Arc<Mutex<Vec<PipelineEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    orchestrator
        .add_event_handler(move |event| sink.lock().unwrap().push(event))
        .await;
    events
}

pub fn assert_status(ctx: &PipelineContext, stage: Stage, expected: StepStatus) {
    assert_eq!(
        ctx.tracker.status(stage),
        Some(expected),
        "unexpected status for {}",
        stage
    );
}

pub fn assert_count(ctx: &PipelineContext, stage: Stage, expected: usize) {
    let record = ctx.tracker.record(stage).expect("stage is tracked");
    assert_eq!(
        record.result_count(),
        expected,
        "unexpected result count for {}",
        stage
    );
}

/// Every tracked stage from `first` on is still pending
pub fn assert_pending_from(ctx: &PipelineContext, first: Stage) {
    for (stage, record) in ctx.tracker.iter().filter(|(s, _)| *s >= first) {
        assert_eq!(
            record.status(),
            StepStatus::Pending,
            "{} should be pending",
            stage
        );
    }
}

pub fn has_log(ctx: &PipelineContext, stage: Stage, fragment: &str) -> bool {
    ctx.tracker
        .record(stage)
        .is_some_and(|r| r.log_lines().iter().any(|line| line.contains(fragment)))
}
