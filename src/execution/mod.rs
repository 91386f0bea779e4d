//! Pipeline execution: the orchestrator and the concurrency primitives it drives

pub mod dispatcher;
pub mod engine;
pub mod enrichment;
pub mod errors;
pub mod poller;
pub mod rate_limiter;

pub use dispatcher::{DispatchFailure, DispatchReport, ParallelDispatcher};
pub use engine::{EventHandler, Orchestrator, PipelineEvent, RunOptions, RunOutcome};
pub use enrichment::{enrich_contacts, EnrichmentOutcome};
pub use errors::StageError;
pub use poller::{BulkJob, BulkJobPoller, JobError, JobState, PollConfig, PollOutcome};
pub use rate_limiter::RateLimiter;
