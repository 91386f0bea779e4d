//! Test: bulk enrichment and its one-by-one fallback

use crate::helpers::*;
use leadflow::core::{Stage, StepStatus};
use leadflow::{RunOptions, RunStatus, StageError};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn branch_options() -> RunOptions {
    RunOptions {
        skip_extraction: true,
        ..test_options()
    }
}

/// A submission without a job id enriches every record one by one
#[tokio::test]
async fn test_missing_job_id_uses_unitary_fallback() {
    let mut fakes = Fakes::new(companies(2, 2));
    fakes.enricher = Arc::new(FakeEnricher::new(BulkMode::NoJobId));
    let orchestrator = fakes.orchestrator(branch_options());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(fakes.enricher.bulk_submissions.load(Ordering::SeqCst), 1);

    let unitary = fakes.enricher.unitary.lock().unwrap().clone();
    assert_eq!(unitary.len(), 4);
    let submitted = fakes.enricher.submitted.lock().unwrap().clone();
    assert_eq!(unitary, submitted);

    assert_status(&ctx, Stage::ContactEnrichment, StepStatus::Completed);
    assert_count(&ctx, Stage::ContactEnrichment, 4);
    assert!(has_log(&ctx, Stage::ContactEnrichment, "one by one"));
    assert_eq!(
        ctx.enriched_contacts[0].email.as_deref(),
        Some("alice.dupont@company1.fr")
    );
}

/// The bulk path never calls the one-by-one endpoint
#[tokio::test]
async fn test_bulk_job_results_are_matched() {
    let fakes = Fakes::new(companies(2, 2));
    let orchestrator = fakes.orchestrator(branch_options());
    let mut ctx = orchestrator.new_context();

    orchestrator.run(&mut ctx).await;

    assert!(fakes.enricher.unitary.lock().unwrap().is_empty());
    assert_eq!(ctx.contacts_with_email(), 4);
    assert!(ctx.enriched_contacts.iter().all(|c| c.email_verified));
}

/// A failed bulk job is a hard failure with no fallback
#[tokio::test]
async fn test_failed_bulk_job_halts_run() {
    let mut fakes = Fakes::new(companies(1, 2));
    fakes.enricher = Arc::new(FakeEnricher::new(BulkMode::Job("error")));
    let orchestrator = fakes.orchestrator(branch_options());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(matches!(outcome.error, Some(StageError::JobFailed { .. })));
    assert_status(&ctx, Stage::ContactEnrichment, StepStatus::Failed);
    assert_pending_from(&ctx, Stage::ContactExport);
    assert!(fakes.enricher.unitary.lock().unwrap().is_empty());
}

/// A bulk job that never finishes times out and fails the stage
#[tokio::test(start_paused = true)]
async fn test_bulk_timeout_halts_run() {
    let mut fakes = Fakes::new(companies(1, 1));
    fakes.enricher = Arc::new(FakeEnricher::new(BulkMode::Job("processing")));
    let orchestrator = fakes.orchestrator(branch_options());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert!(matches!(outcome.error, Some(StageError::PollTimeout { .. })));
    assert_status(&ctx, Stage::ContactEnrichment, StepStatus::Failed);
}
