//! Bounded worker pool running one task per entity

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// A task that did not produce a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    pub key: String,
    pub error: String,
}

/// Results keyed by entity, plus the entities whose task failed
#[derive(Debug)]
pub struct DispatchReport<R> {
    pub results: HashMap<String, R>,
    pub failures: Vec<DispatchFailure>,
}

impl<R> DispatchReport<R> {
    fn new() -> Self {
        Self {
            results: HashMap::new(),
            failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParallelDispatcher {
    max_workers: usize,
}

impl Default for ParallelDispatcher {
    fn default() -> Self {
        Self::new(3)
    }
}

impl ParallelDispatcher {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run `worker` once per `(key, entity)` with at most `max_workers` in flight
    ///
    /// A task that errors or panics is logged against its key and left out of
    /// the results; the other tasks are unaffected.
    pub async fn run<E, R, Err, F, Fut>(
        &self,
        entities: Vec<(String, E)>,
        worker: F,
    ) -> DispatchReport<R>
    where
        E: Send + 'static,
        R: Send + 'static,
        Err: Display + Send + 'static,
        F: Fn(E) -> Fut,
        Fut: Future<Output = Result<R, Err>> + Send + 'static,
    {
        let mut report = DispatchReport::new();
        let mut join_set: JoinSet<(String, Result<R, String>)> = JoinSet::new();
        let mut pending = entities.into_iter();

        loop {
            while join_set.len() < self.max_workers {
                let Some((key, entity)) = pending.next() else {
                    break;
                };
                let task = worker(entity);
                debug!("Dispatching task for {}", key);
                join_set.spawn(async move {
                    // inner spawn so a panic is reported against this key
                    let outcome = match tokio::spawn(task).await {
                        Ok(Ok(result)) => Ok(result),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(join_error) => Err(format!("task panicked: {}", join_error)),
                    };
                    (key, outcome)
                });
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };

            match joined {
                Ok((key, Ok(result))) => {
                    report.results.insert(key, result);
                }
                Ok((key, Err(error))) => {
                    warn!("Task for {} failed: {}", key, error);
                    report.failures.push(DispatchFailure { key, error });
                }
                Err(e) => {
                    warn!("Task join error: {}", e);
                }
            }
        }

        report
    }
}
