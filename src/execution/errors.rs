//! Stage-level error taxonomy

use crate::core::{Stage, TrackerError};
use crate::execution::poller::JobError;
use crate::providers::ProviderError;
use std::time::Duration;
use thiserror::Error;

/// Why a stage did not produce its result
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Transport(#[from] ProviderError),

    #[error("job submission failed: {0}")]
    SubmissionFailed(String),

    #[error("job {job_id} did not finish within {waited:?}")]
    PollTimeout { job_id: String, waited: Duration },

    #[error("job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("{0} produced no results")]
    EmptyResult(Stage),

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("stopped by user")]
    UserStop,

    #[error(transparent)]
    Internal(#[from] TrackerError),
}

impl StageError {
    /// A job that outlived its poll budget or a provider that never answered
    pub fn is_timeout(&self) -> bool {
        match self {
            StageError::PollTimeout { .. } => true,
            StageError::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }
}

impl From<JobError> for StageError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::SubmissionFailed(reason) => StageError::SubmissionFailed(reason),
            JobError::Failed { job_id, reason } => StageError::JobFailed { job_id, reason },
            JobError::TimedOut { job_id, waited } => StageError::PollTimeout { job_id, waited },
            JobError::Fetch { source, .. } => StageError::Transport(source),
        }
    }
}
