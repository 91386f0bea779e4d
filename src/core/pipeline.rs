//! Step tracker - one state record per configured stage

use crate::core::{
    state::{StepRecord, StepStatus, TransitionError},
    step::Stage,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("stage {0} is not part of this run")]
    UnknownStage(Stage),

    #[error("stage {stage}: {source}")]
    Transition {
        stage: Stage,
        #[source]
        source: TransitionError,
    },
}

/// The fixed set of step records for a run
///
/// The stage set is chosen when the tracker is built and never changes
/// afterwards; `reset` swaps in a brand new set of pending records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepTracker {
    records: BTreeMap<Stage, StepRecord>,
}

impl StepTracker {
    pub fn new(stages: &[Stage]) -> Self {
        let records = stages
            .iter()
            .map(|stage| (*stage, StepRecord::new()))
            .collect();
        Self { records }
    }

    /// Stages in pipeline order
    pub fn stages(&self) -> Vec<Stage> {
        self.records.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.records.contains_key(&stage)
    }

    pub fn record(&self, stage: Stage) -> Option<&StepRecord> {
        self.records.get(&stage)
    }

    pub fn status(&self, stage: Stage) -> Option<StepStatus> {
        self.records.get(&stage).map(StepRecord::status)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, &StepRecord)> {
        self.records.iter().map(|(stage, record)| (*stage, record))
    }

    fn apply<F>(&mut self, stage: Stage, op: F) -> Result<(), TrackerError>
    where
        F: FnOnce(&mut StepRecord) -> Result<(), TransitionError>,
    {
        let record = self
            .records
            .get_mut(&stage)
            .ok_or(TrackerError::UnknownStage(stage))?;
        op(record).map_err(|source| TrackerError::Transition { stage, source })
    }

    pub fn start(&mut self, stage: Stage) -> Result<(), TrackerError> {
        self.apply(stage, StepRecord::start)
    }

    pub fn complete(&mut self, stage: Stage, result_count: usize) -> Result<(), TrackerError> {
        self.apply(stage, |r| r.complete(result_count))
    }

    pub fn fail(&mut self, stage: Stage, error: impl Into<String>) -> Result<(), TrackerError> {
        let error = error.into();
        self.apply(stage, |r| r.fail(error))
    }

    pub fn stop(&mut self, stage: Stage, reason: impl Into<String>) -> Result<(), TrackerError> {
        let reason = reason.into();
        self.apply(stage, |r| r.stop(reason))
    }

    pub fn skip(&mut self, stage: Stage, reason: impl Into<String>) -> Result<(), TrackerError> {
        let reason = reason.into();
        self.apply(stage, |r| r.skip(reason))
    }

    pub fn abandon(&mut self, stage: Stage, reason: impl Into<String>) -> Result<(), TrackerError> {
        let reason = reason.into();
        self.apply(stage, |r| r.abandon(reason))
    }

    /// Append a log line to a stage; unknown stages are ignored
    pub fn log(&mut self, stage: Stage, message: impl AsRef<str>) {
        if let Some(record) = self.records.get_mut(&stage) {
            record.log(message);
        }
    }

    /// Replace every record with a fresh pending one
    pub fn reset(&mut self) {
        let fresh = StepTracker::new(&self.stages());
        *self = fresh;
    }

    /// Number of stages that completed or were skipped
    pub fn finished_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| matches!(r.status(), StepStatus::Completed | StepStatus::Skipped))
            .count()
    }

    /// Calculate progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        self.finished_count() as f64 / self.records.len() as f64
    }

    /// First stage that ended in failure, if any
    pub fn first_failure(&self) -> Option<(Stage, &StepRecord)> {
        self.iter().find(|(_, r)| r.status() == StepStatus::Failed)
    }
}
