//! leadflow - lead generation pipeline for French companies

pub mod cli;
pub mod core;
pub mod execution;
pub mod providers;

// Re-export commonly used types
pub use core::{config::LeadflowConfig, PipelineContext, RunStatus, Stage, StepStatus, StopFlag};
pub use execution::{Orchestrator, PipelineEvent, RunOptions, RunOutcome, StageError};
pub use providers::{ProviderError, ProviderSet};
