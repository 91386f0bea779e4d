//! Pipeline context - step records and accumulated entities for one run

use crate::core::{
    entity::{Company, Contact, Employee},
    pipeline::StepTracker,
    state::RunState,
    step::Stage,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop request, observed at stage boundaries
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Everything the orchestrator owns for a single run
///
/// Created per run and never shared globally. Entities only gain fields as
/// the run progresses; earlier stages' data is never removed except by
/// [`PipelineContext::reset`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineContext {
    pub run: RunState,

    pub tracker: StepTracker,

    /// Companies from stage 1, enriched with LinkedIn URLs in stage 2
    pub companies: Vec<Company>,

    /// Extracted employees keyed by SIREN
    pub company_employees: BTreeMap<String, Vec<Employee>>,

    /// Output of stage 5, or of the leader derivation on the branch
    pub decision_makers: Vec<Contact>,

    /// Output of stage 6
    pub enriched_contacts: Vec<Contact>,

    pub companies_csv: Option<PathBuf>,

    pub contacts_csv: Option<PathBuf>,
}

impl PipelineContext {
    /// Create a fresh context tracking the given stages
    pub fn new(stages: &[Stage]) -> Self {
        Self {
            run: RunState::new(),
            tracker: StepTracker::new(stages),
            companies: Vec::new(),
            company_employees: BTreeMap::new(),
            decision_makers: Vec::new(),
            enriched_contacts: Vec::new(),
            companies_csv: None,
            contacts_csv: None,
        }
    }

    /// Fresh records, empty entity lists, new run id
    pub fn reset(&mut self) {
        let fresh = PipelineContext::new(&self.tracker.stages());
        *self = fresh;
    }

    pub fn companies_with_linkedin(&self) -> impl Iterator<Item = &Company> {
        self.companies.iter().filter(|c| c.has_linkedin())
    }

    pub fn company_by_siren(&self, siren: &str) -> Option<&Company> {
        self.companies.iter().find(|c| c.siren == siren)
    }

    pub fn total_employees(&self) -> usize {
        self.company_employees.values().map(Vec::len).sum()
    }

    pub fn contacts_with_email(&self) -> usize {
        self.enriched_contacts.iter().filter(|c| c.has_email()).count()
    }
}
