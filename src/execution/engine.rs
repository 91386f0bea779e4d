//! Pipeline orchestrator - sequences the stages of one run

use crate::{
    core::{
        config::{LeadflowConfig, SearchFilters},
        Company, Contact, FailureClass, PipelineContext, RunStatus, Stage, StepStatus, StopFlag,
    },
    execution::{
        enrichment::enrich_contacts,
        errors::StageError,
        poller::{BulkJobPoller, PollConfig},
        ParallelDispatcher,
    },
    providers::{EmployeeExtractor, ProviderError, ProviderSet},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events emitted while a run progresses
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    RunStarted {
        run_id: Uuid,
        stages: Vec<Stage>,
    },
    StageStarted {
        stage: Stage,
    },
    StageCompleted {
        stage: Stage,
        result_count: usize,
    },
    StageFailed {
        stage: Stage,
        error: String,
    },
    StageSkipped {
        stage: Stage,
        reason: String,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Per-run knobs
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Cap on companies taken from the registry
    pub max_entities: Option<usize>,
    /// Derive decision makers from registry leaders instead of LinkedIn employees
    pub skip_extraction: bool,
    pub filters: SearchFilters,
    pub extraction_poll: PollConfig,
    pub enrichment_poll: PollConfig,
    pub max_workers: usize,
    /// Track the optional spreadsheet and campaign stages
    pub track_sinks: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_entities: None,
            skip_extraction: false,
            filters: SearchFilters::default(),
            extraction_poll: PollConfig::default(),
            enrichment_poll: PollConfig::default(),
            max_workers: 3,
            track_sinks: false,
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &LeadflowConfig) -> Self {
        Self {
            max_entities: config.run.max_entities,
            skip_extraction: config.run.skip_extraction,
            filters: config.pappers.filters.clone(),
            extraction_poll: config.phantombuster.poll.into(),
            enrichment_poll: config.captely.poll.into(),
            max_workers: config.run.max_workers,
            track_sinks: config.has_optional_sinks(),
        }
    }
}

/// Summary of a finished run
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    /// Stage that stopped the run, if any
    pub halted_at: Option<Stage>,
    pub error: Option<StageError>,
    pub companies: usize,
    pub decision_makers: usize,
    pub enriched_contacts: usize,
    pub contacts_with_email: usize,
    pub companies_csv: Option<PathBuf>,
    pub contacts_csv: Option<PathBuf>,
    pub duration: Duration,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Runs the pipeline stages in order against a [`PipelineContext`]
pub struct Orchestrator {
    providers: ProviderSet,
    options: RunOptions,
    stop: StopFlag,
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl Orchestrator {
    pub fn new(providers: ProviderSet, options: RunOptions) -> Self {
        Self {
            providers,
            options,
            stop: StopFlag::new(),
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Stages a run tracks with the current options
    pub fn stages(&self) -> Vec<Stage> {
        if self.options.track_sinks {
            Stage::ALL.to_vec()
        } else {
            Stage::CORE.to_vec()
        }
    }

    pub fn new_context(&self) -> PipelineContext {
        PipelineContext::new(&self.stages())
    }

    /// Handle for requesting a stop from another task
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: PipelineEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute every stage from the first one
    ///
    /// The context is reset first, so a context can be reused across runs.
    pub async fn run(&self, ctx: &mut PipelineContext) -> RunOutcome {
        let started = self.begin(ctx).await;
        let halt = self.drive(ctx, Stage::CompanySearch).await;
        self.finish(ctx, started, halt).await
    }

    /// Execute from employee extraction using companies loaded from a CSV file
    ///
    /// Stages 1 to 3 are recorded as completed from the loaded data.
    pub async fn resume_from_companies(
        &self,
        ctx: &mut PipelineContext,
        companies: Vec<Company>,
        source: PathBuf,
    ) -> RunOutcome {
        let started = self.begin(ctx).await;

        if companies.is_empty() {
            let error = StageError::EmptyResult(Stage::CompanySearch);
            let halt = match self.fail_stage(ctx, Stage::CompanySearch, &error).await {
                Ok(()) => (Stage::CompanySearch, error),
                Err(internal) => (Stage::CompanySearch, internal),
            };
            return self.finish(ctx, started, Some(halt)).await;
        }

        let with_linkedin = companies.iter().filter(|c| c.has_linkedin()).count();
        let total = companies.len();
        ctx.companies = companies;
        ctx.companies_csv = Some(source.clone());

        for (stage, count) in [
            (Stage::CompanySearch, total),
            (Stage::LinkedinResolution, with_linkedin),
            (Stage::CompanyExport, total),
        ] {
            if let Err(e) = self.preload_stage(ctx, stage, count, &source).await {
                return self.finish(ctx, started, Some((stage, e))).await;
            }
        }
        info!("Loaded {} companies from {}", total, source.display());

        let halt = self.drive(ctx, Stage::EmployeeExtraction).await;
        self.finish(ctx, started, halt).await
    }

    async fn begin(&self, ctx: &mut PipelineContext) -> Instant {
        ctx.reset();
        self.stop.clear();
        ctx.run.start();

        info!(
            "Starting pipeline run {} ({} stages)",
            ctx.run.run_id,
            ctx.tracker.len()
        );
        self.emit_event(PipelineEvent::RunStarted {
            run_id: ctx.run.run_id,
            stages: ctx.tracker.stages(),
        })
        .await;
        Instant::now()
    }

    async fn preload_stage(
        &self,
        ctx: &mut PipelineContext,
        stage: Stage,
        count: usize,
        source: &Path,
    ) -> Result<(), StageError> {
        ctx.tracker.start(stage)?;
        self.emit_event(PipelineEvent::StageStarted { stage }).await;
        ctx.tracker
            .log(stage, format!("loaded from CSV {}", source.display()));
        ctx.tracker.complete(stage, count)?;
        self.emit_event(PipelineEvent::StageCompleted {
            stage,
            result_count: count,
        })
        .await;
        Ok(())
    }

    /// Run tracked stages starting at `first`; returns the halting stage and error
    async fn drive(
        &self,
        ctx: &mut PipelineContext,
        first: Stage,
    ) -> Option<(Stage, StageError)> {
        let stages: Vec<Stage> = ctx
            .tracker
            .stages()
            .into_iter()
            .filter(|s| *s >= first)
            .collect();

        for stage in stages {
            if self.stop.is_stop_requested() {
                warn!("Stop requested, not starting {}", stage);
                let reason = StageError::UserStop.to_string();
                if let Err(e) = ctx.tracker.stop(stage, &reason) {
                    return Some((stage, e.into()));
                }
                self.emit_event(PipelineEvent::StageFailed {
                    stage,
                    error: reason,
                })
                .await;
                return Some((stage, StageError::UserStop));
            }

            if let Some(reason) = self.skip_reason(stage, ctx) {
                info!("Skipping {}: {}", stage, reason);
                if let Err(e) = ctx.tracker.skip(stage, &reason) {
                    return Some((stage, e.into()));
                }
                self.emit_event(PipelineEvent::StageSkipped { stage, reason })
                    .await;
                continue;
            }

            if let Err(e) = self.run_stage(ctx, stage).await {
                return Some((stage, e));
            }
        }
        None
    }

    /// Start, execute and record one stage; `Err` means the run must halt
    async fn run_stage(&self, ctx: &mut PipelineContext, stage: Stage) -> Result<(), StageError> {
        ctx.tracker.start(stage)?;
        self.emit_event(PipelineEvent::StageStarted { stage }).await;
        info!("Running {}", stage);

        let result = match stage {
            Stage::CompanySearch => self.search_companies(ctx).await,
            Stage::LinkedinResolution => self.resolve_linkedin(ctx).await,
            Stage::CompanyExport => self.export_companies(ctx),
            Stage::EmployeeExtraction => self.extract_employees(ctx).await,
            Stage::DecisionMakerFilter => self.filter_decision_makers(ctx).await,
            Stage::ContactEnrichment => self.enrich(ctx).await,
            Stage::ContactExport => self.export_contacts(ctx),
            Stage::SpreadsheetSync => self.sync_spreadsheet(ctx).await,
            Stage::CampaignPush => self.push_campaign(ctx).await,
        }
        .and_then(|count| {
            if count == 0 && stage.empty_is_failure() {
                Err(StageError::EmptyResult(stage))
            } else {
                Ok(count)
            }
        });

        match result {
            Ok(count) => {
                ctx.tracker.complete(stage, count)?;
                info!("{} completed with {} results", stage, count);
                self.emit_event(PipelineEvent::StageCompleted {
                    stage,
                    result_count: count,
                })
                .await;
                Ok(())
            }
            Err(e) => match stage.failure_class() {
                FailureClass::Hard => {
                    error!("{} failed: {}", stage, e);
                    self.fail_stage(ctx, stage, &e).await?;
                    Err(e)
                }
                FailureClass::Soft if e.is_timeout() => {
                    warn!("{} timed out, continuing: {}", stage, e);
                    let reason = e.to_string();
                    ctx.tracker.abandon(stage, &reason)?;
                    self.emit_event(PipelineEvent::StageSkipped { stage, reason })
                        .await;
                    Ok(())
                }
                FailureClass::Soft => {
                    warn!("{} failed, continuing: {}", stage, e);
                    self.fail_stage(ctx, stage, &e).await?;
                    Ok(())
                }
            },
        }
    }

    async fn fail_stage(
        &self,
        ctx: &mut PipelineContext,
        stage: Stage,
        error: &StageError,
    ) -> Result<(), StageError> {
        let message = error.to_string();
        if ctx.tracker.status(stage) == Some(StepStatus::Pending) {
            ctx.tracker.start(stage)?;
        }
        ctx.tracker.fail(stage, &message)?;
        self.emit_event(PipelineEvent::StageFailed {
            stage,
            error: message,
        })
        .await;
        Ok(())
    }

    fn skip_reason(&self, stage: Stage, ctx: &PipelineContext) -> Option<String> {
        match stage {
            Stage::EmployeeExtraction if self.options.skip_extraction => {
                Some("extraction disabled, using registry leaders".to_string())
            }
            Stage::SpreadsheetSync => {
                if self.providers.spreadsheet.is_none() {
                    Some("spreadsheet not configured".to_string())
                } else if ctx.companies.is_empty() && ctx.enriched_contacts.is_empty() {
                    Some("nothing to sync".to_string())
                } else {
                    None
                }
            }
            Stage::CampaignPush => {
                if self.providers.campaign.is_none() {
                    Some("campaign not configured".to_string())
                } else if ctx.contacts_with_email() == 0 {
                    Some("no contacts with an email".to_string())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    async fn finish(
        &self,
        ctx: &mut PipelineContext,
        started: Instant,
        halt: Option<(Stage, StageError)>,
    ) -> RunOutcome {
        let status = match &halt {
            None => RunStatus::Completed,
            Some((_, StageError::UserStop)) => RunStatus::Stopped,
            Some(_) => RunStatus::Failed,
        };
        ctx.run.finish(status);

        match &halt {
            None => info!("Pipeline run {} completed", ctx.run.run_id),
            Some((stage, e)) => error!(
                "Pipeline run {} halted at {}: {}",
                ctx.run.run_id, stage, e
            ),
        }
        self.emit_event(PipelineEvent::RunFinished {
            run_id: ctx.run.run_id,
            status,
        })
        .await;

        let (halted_at, error) = match halt {
            Some((stage, e)) => (Some(stage), Some(e)),
            None => (None, None),
        };
        RunOutcome {
            run_id: ctx.run.run_id,
            status,
            halted_at,
            error,
            companies: ctx.companies.len(),
            decision_makers: ctx.decision_makers.len(),
            enriched_contacts: ctx.enriched_contacts.len(),
            contacts_with_email: ctx.contacts_with_email(),
            companies_csv: ctx.companies_csv.clone(),
            contacts_csv: ctx.contacts_csv.clone(),
            duration: started.elapsed(),
        }
    }

    // Stage bodies. Each returns the stage's result count.

    async fn search_companies(&self, ctx: &mut PipelineContext) -> Result<usize, StageError> {
        let mut companies = self
            .providers
            .companies
            .search(&self.options.filters, self.options.max_entities)
            .await?;
        if let Some(max) = self.options.max_entities {
            companies.truncate(max);
        }
        ctx.tracker.log(
            Stage::CompanySearch,
            format!("fetched {} companies", companies.len()),
        );
        ctx.companies = companies;
        Ok(ctx.companies.len())
    }

    async fn resolve_linkedin(&self, ctx: &mut PipelineContext) -> Result<usize, StageError> {
        if ctx.companies.is_empty() {
            return Err(StageError::EmptyResult(Stage::LinkedinResolution));
        }
        let resolver = self.providers.resolver.clone();
        let mut unresolved = 0;

        for company in ctx.companies.iter_mut() {
            match resolver.resolve(company).await {
                Ok(Some(url)) => {
                    debug!("{} -> {}", company.name, url);
                    company.linkedin_url = Some(url);
                }
                Ok(None) => {
                    debug!("No LinkedIn page found for {}", company.name);
                    unresolved += 1;
                }
                Err(e) => {
                    warn!("LinkedIn lookup failed for {}: {}", company.name, e);
                    unresolved += 1;
                }
            }
        }

        let resolved = ctx.companies_with_linkedin().count();
        ctx.tracker.log(
            Stage::LinkedinResolution,
            format!("{} resolved, {} without a LinkedIn page", resolved, unresolved),
        );
        Ok(resolved)
    }

    fn export_companies(&self, ctx: &mut PipelineContext) -> Result<usize, StageError> {
        let path = self.providers.company_export.export_companies(&ctx.companies)?;
        ctx.tracker.log(
            Stage::CompanyExport,
            format!("wrote {}", path.display()),
        );
        ctx.companies_csv = Some(path);
        Ok(ctx.companies.len())
    }

    async fn extract_employees(&self, ctx: &mut PipelineContext) -> Result<usize, StageError> {
        let entities: Vec<(String, Company)> = ctx
            .companies_with_linkedin()
            .map(|c| (c.siren.clone(), c.clone()))
            .collect();
        let poller: Arc<BulkJobPoller<dyn EmployeeExtractor>> = Arc::new(BulkJobPoller::new(
            self.providers.extractor.clone(),
            self.options.extraction_poll,
        ));

        let dispatcher = ParallelDispatcher::new(self.options.max_workers);
        let report = dispatcher
            .run(entities, move |company| {
                let poller = poller.clone();
                async move { poller.run(&company).await.map(|job| job.results) }
            })
            .await;

        for failure in &report.failures {
            ctx.tracker.log(
                Stage::EmployeeExtraction,
                format!("{}: {}", failure.key, failure.error),
            );
        }
        for (siren, employees) in report.results {
            if employees.is_empty() {
                debug!("No employees extracted for {}", siren);
                continue;
            }
            ctx.company_employees.insert(siren, employees);
        }

        ctx.tracker.log(
            Stage::EmployeeExtraction,
            format!(
                "{} employees across {} companies",
                ctx.total_employees(),
                ctx.company_employees.len()
            ),
        );
        Ok(ctx.company_employees.len())
    }

    async fn filter_decision_makers(
        &self,
        ctx: &mut PipelineContext,
    ) -> Result<usize, StageError> {
        let contacts = if self.options.skip_extraction {
            let contacts: Vec<Contact> = ctx
                .companies
                .iter()
                .flat_map(|company| {
                    company
                        .leaders
                        .iter()
                        .map(move |leader| Contact::from_leader(company, leader))
                })
                .collect();
            ctx.tracker.log(
                Stage::DecisionMakerFilter,
                format!("{} decision makers from registry leaders", contacts.len()),
            );
            contacts
        } else {
            self.shortlist_employees(ctx).await?
        };

        ctx.decision_makers = contacts;
        Ok(ctx.decision_makers.len())
    }

    async fn shortlist_employees(
        &self,
        ctx: &mut PipelineContext,
    ) -> Result<Vec<Contact>, StageError> {
        let mut contacts = Vec::new();
        let mut first_error: Option<ProviderError> = None;

        for (siren, employees) in &ctx.company_employees {
            let Some(company) = ctx.company_by_siren(siren) else {
                continue;
            };
            match self.providers.filter.filter(employees, &company.name).await {
                Ok(shortlist) => {
                    debug!("{}: {} decision makers", company.name, shortlist.len());
                    contacts.extend(shortlist.into_iter().map(|c| c.at_company(company)));
                }
                Err(e) => {
                    warn!("Filtering failed for {}: {}", company.name, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if contacts.is_empty() => Err(e.into()),
            _ => {
                ctx.tracker.log(
                    Stage::DecisionMakerFilter,
                    format!("{} decision makers shortlisted", contacts.len()),
                );
                Ok(contacts)
            }
        }
    }

    async fn enrich(&self, ctx: &mut PipelineContext) -> Result<usize, StageError> {
        let outcome = enrich_contacts(
            self.providers.enricher.clone(),
            self.options.enrichment_poll,
            ctx.decision_makers.clone(),
        )
        .await?;

        if outcome.used_fallback {
            ctx.tracker
                .log(Stage::ContactEnrichment, "bulk submission failed, enriched one by one");
        }
        if outcome.dropped > 0 {
            ctx.tracker.log(
                Stage::ContactEnrichment,
                format!("{} results matched no contact", outcome.dropped),
            );
        }
        let with_email = outcome.with_email();
        ctx.tracker.log(
            Stage::ContactEnrichment,
            format!("{} of {} contacts have an email", with_email, outcome.contacts.len()),
        );
        ctx.enriched_contacts = outcome.contacts;
        Ok(with_email)
    }

    fn export_contacts(&self, ctx: &mut PipelineContext) -> Result<usize, StageError> {
        let path = self
            .providers
            .contact_export
            .export_contacts(&ctx.enriched_contacts)?;
        ctx.tracker.log(
            Stage::ContactExport,
            format!("wrote {}", path.display()),
        );
        ctx.contacts_csv = Some(path);
        Ok(ctx.enriched_contacts.len())
    }

    async fn sync_spreadsheet(&self, ctx: &mut PipelineContext) -> Result<usize, StageError> {
        let sink = self
            .providers
            .spreadsheet
            .clone()
            .ok_or_else(|| StageError::NotConfigured("spreadsheet".to_string()))?;

        let mut synced = 0;
        if !ctx.companies.is_empty() {
            synced += sink.sync_companies(&ctx.companies).await?;
        }
        if !ctx.enriched_contacts.is_empty() {
            synced += sink.sync_contacts(&ctx.enriched_contacts).await?;
        }
        ctx.tracker
            .log(Stage::SpreadsheetSync, format!("synced {} rows", synced));
        Ok(synced)
    }

    async fn push_campaign(&self, ctx: &mut PipelineContext) -> Result<usize, StageError> {
        let sink = self
            .providers
            .campaign
            .clone()
            .ok_or_else(|| StageError::NotConfigured("campaign".to_string()))?;

        let contacts: Vec<Contact> = ctx
            .enriched_contacts
            .iter()
            .filter(|c| c.has_email())
            .cloned()
            .collect();
        let report = sink.push(&contacts).await?;

        for e in &report.errors {
            ctx.tracker.log(Stage::CampaignPush, e);
        }
        if report.pushed == 0 && report.failed > 0 {
            return Err(ProviderError::Transport(format!(
                "all {} contacts were rejected",
                report.failed
            ))
            .into());
        }
        ctx.tracker.log(
            Stage::CampaignPush,
            format!("pushed {}, failed {}", report.pushed, report.failed),
        );
        Ok(report.pushed)
    }
}
