//! Step state models

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Status of a single pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Stage has not started
    Pending,
    /// Stage is currently running
    Running,
    /// Stage finished without error
    Completed,
    /// Stage raised an error (or the run was stopped before it)
    Failed,
    /// Stage was bypassed
    Skipped,
}

impl StepStatus {
    /// Check if status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

/// Rejected state change on a [`StepRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid step transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: StepStatus,
    pub to: StepStatus,
}

/// Tracked state of one pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    status: StepStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result_count: usize,
    error_message: Option<String>,
    log_lines: Vec<String>,
}

impl StepRecord {
    /// Create a fresh pending record
    pub fn new() -> Self {
        Self {
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            result_count: 0,
            error_message: None,
            log_lines: Vec::new(),
        }
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn result_count(&self) -> usize {
        self.result_count
    }

    /// Failure description, present only when the stage failed
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn log_lines(&self) -> &[String] {
        &self.log_lines
    }

    fn reject(&self, to: StepStatus) -> TransitionError {
        TransitionError {
            from: self.status,
            to,
        }
    }

    /// PENDING -> RUNNING
    pub fn start(&mut self) -> Result<(), TransitionError> {
        if self.status != StepStatus::Pending {
            return Err(self.reject(StepStatus::Running));
        }
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
        self.error_message = None;
        Ok(())
    }

    /// RUNNING -> COMPLETED
    pub fn complete(&mut self, result_count: usize) -> Result<(), TransitionError> {
        if self.status != StepStatus::Running {
            return Err(self.reject(StepStatus::Completed));
        }
        self.status = StepStatus::Completed;
        self.result_count = result_count;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// RUNNING -> FAILED
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        if self.status != StepStatus::Running {
            return Err(self.reject(StepStatus::Failed));
        }
        self.status = StepStatus::Failed;
        self.error_message = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// PENDING -> FAILED, only used when a stop request prevents the stage from starting
    pub fn stop(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        if self.status != StepStatus::Pending {
            return Err(self.reject(StepStatus::Failed));
        }
        self.status = StepStatus::Failed;
        self.error_message = Some(reason.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// PENDING -> SKIPPED
    pub fn skip(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        if self.status != StepStatus::Pending {
            return Err(self.reject(StepStatus::Skipped));
        }
        self.status = StepStatus::Skipped;
        self.log(format!("skipped: {}", reason.into()));
        Ok(())
    }

    /// RUNNING -> SKIPPED, for optional stages whose work timed out
    pub fn abandon(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        if self.status != StepStatus::Running {
            return Err(self.reject(StepStatus::Skipped));
        }
        self.status = StepStatus::Skipped;
        self.completed_at = Some(Utc::now());
        self.log(format!("skipped: {}", reason.into()));
        Ok(())
    }

    /// Append a timestamped log line
    pub fn log(&mut self, message: impl AsRef<str>) {
        let timestamp = Local::now().format("%H:%M:%S");
        self.log_lines
            .push(format!("[{}] {}", timestamp, message.as_ref()));
    }
}

impl Default for StepRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is in progress
    Running,
    /// All hard stages succeeded
    Completed,
    /// A hard stage failed
    Failed,
    /// Run was stopped at a stage boundary
    Stopped,
}

/// Run-level bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current run status
    pub status: RunStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run finished
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
