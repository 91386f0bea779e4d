//! Submit, poll and fetch for asynchronous provider jobs

use crate::core::config::PollSettings;
use crate::providers::ProviderError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Normalized job status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    InProgress,
    Succeeded,
    Failed,
}

impl JobState {
    /// Map a provider's status string onto the normalized states
    ///
    /// Unrecognized values are treated as still running.
    pub fn from_provider(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "completed" | "finished" | "success" => JobState::Succeeded,
            "failed" | "error" => JobState::Failed,
            _ => JobState::InProgress,
        }
    }
}

/// Raw status answer from a provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStatusReport {
    pub status: String,
    pub progress: Option<u64>,
    pub total: Option<u64>,
    pub error: Option<String>,
}

impl JobStatusReport {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Default::default()
        }
    }

    pub fn state(&self) -> JobState {
        JobState::from_provider(&self.status)
    }
}

/// A provider that runs work as submit / status / paged-results jobs
#[async_trait]
pub trait JobProvider: Send + Sync {
    type Request: Send + Sync;
    type Record: Send;

    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Submit a job; `Ok(None)` means the provider answered without a job id
    async fn submit(&self, request: &Self::Request) -> Result<Option<String>, ProviderError>;

    async fn status(&self, job_id: &str) -> Result<JobStatusReport, ProviderError>;

    /// Fetch one page of results (pages start at 1)
    async fn fetch_page(
        &self,
        job_id: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<Self::Record>, ProviderError>;
}

/// Poll cadence and result paging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub timeout: Duration,
    pub interval: Duration,
    pub page_size: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollSettings::default().into()
    }
}

impl From<PollSettings> for PollConfig {
    fn from(settings: PollSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            interval: Duration::from_secs(settings.interval_secs),
            page_size: settings.page_size,
        }
    }
}

/// Terminal result of polling one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed(String),
    TimedOut,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job submission failed: {0}")]
    SubmissionFailed(String),

    #[error("job {job_id} failed: {reason}")]
    Failed { job_id: String, reason: String },

    #[error("job {job_id} did not finish within {waited:?}")]
    TimedOut { job_id: String, waited: Duration },

    #[error("fetching results of job {job_id} failed: {source}")]
    Fetch {
        job_id: String,
        #[source]
        source: ProviderError,
    },
}

/// A finished job and its results
#[derive(Debug, Clone)]
pub struct BulkJob<R> {
    pub job_id: String,
    pub state: JobState,
    pub results: Vec<R>,
}

/// Drives a [`JobProvider`] through submit, poll and fetch
pub struct BulkJobPoller<P: JobProvider + ?Sized> {
    provider: Arc<P>,
    config: PollConfig,
}

impl<P: JobProvider + ?Sized> BulkJobPoller<P> {
    pub fn new(provider: Arc<P>, config: PollConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// One submission attempt, never retried
    pub async fn submit(&self, request: &P::Request) -> Result<String, JobError> {
        match self.provider.submit(request).await {
            Ok(Some(job_id)) if !job_id.trim().is_empty() => {
                info!("{} job submitted: {}", self.provider.name(), job_id);
                Ok(job_id)
            }
            Ok(_) => Err(JobError::SubmissionFailed(format!(
                "{} returned no job id",
                self.provider.name()
            ))),
            Err(e) => Err(JobError::SubmissionFailed(e.to_string())),
        }
    }

    /// Query status every `interval` until the job ends or `timeout` elapses
    ///
    /// A status request that errors counts as "still in progress".
    pub async fn poll_until_terminal(
        &self,
        job_id: &str,
        timeout: Duration,
        interval: Duration,
    ) -> PollOutcome {
        let started = Instant::now();
        let mut last_progress = None;

        loop {
            match self.provider.status(job_id).await {
                Ok(report) => {
                    if report.progress.is_some() && report.progress != last_progress {
                        debug!(
                            "{} job {}: {} {}/{}",
                            self.provider.name(),
                            job_id,
                            report.status,
                            report.progress.unwrap_or(0),
                            report.total.unwrap_or(0)
                        );
                        last_progress = report.progress;
                    }
                    match report.state() {
                        JobState::Succeeded => return PollOutcome::Completed,
                        JobState::Failed => {
                            let reason = report.error.unwrap_or(report.status);
                            return PollOutcome::Failed(reason);
                        }
                        JobState::InProgress => {}
                    }
                }
                Err(e) => {
                    warn!(
                        "{} status check for job {} failed, still waiting: {}",
                        self.provider.name(),
                        job_id,
                        e
                    );
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                warn!(
                    "{} job {} timed out after {:?}",
                    self.provider.name(),
                    job_id,
                    elapsed
                );
                return PollOutcome::TimedOut;
            }
            sleep(interval.min(timeout - elapsed)).await;
        }
    }

    /// Read every result page; stops at the first short page
    pub async fn fetch_results(
        &self,
        job_id: &str,
        page_size: usize,
    ) -> Result<Vec<P::Record>, ProviderError> {
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.provider.fetch_page(job_id, page, page_size).await?;
            let short = batch.len() < page_size;
            records.extend(batch);
            if short || page_size == 0 {
                break;
            }
            page += 1;
        }
        Ok(records)
    }

    /// Submit, wait for a terminal state, then fetch all results
    pub async fn run(&self, request: &P::Request) -> Result<BulkJob<P::Record>, JobError> {
        let job_id = self.submit(request).await?;
        self.finish(job_id).await
    }

    /// Poll and fetch a job that has already been submitted
    pub async fn finish(&self, job_id: String) -> Result<BulkJob<P::Record>, JobError> {
        match self
            .poll_until_terminal(&job_id, self.config.timeout, self.config.interval)
            .await
        {
            PollOutcome::Completed => {}
            PollOutcome::Failed(reason) => return Err(JobError::Failed { job_id, reason }),
            PollOutcome::TimedOut => {
                return Err(JobError::TimedOut {
                    job_id,
                    waited: self.config.timeout,
                })
            }
        }

        let results = match self.fetch_results(&job_id, self.config.page_size).await {
            Ok(results) => results,
            Err(source) => return Err(JobError::Fetch { job_id, source }),
        };
        info!(
            "{} job {} returned {} records",
            self.provider.name(),
            job_id,
            results.len()
        );

        Ok(BulkJob {
            job_id,
            state: JobState::Succeeded,
            results,
        })
    }
}
