//! Test: cooperative stop requests observed at stage boundaries

use crate::helpers::*;
use leadflow::core::{Stage, StepStatus};
use leadflow::{PipelineEvent, RunStatus, StageError};

/// Stop requested while stage 2 runs: stage 3 is marked stopped
#[tokio::test]
async fn test_stop_after_stage_two() {
    let fakes = Fakes::new(companies(3, 1));
    let orchestrator = fakes.orchestrator(test_options());
    let stop = orchestrator.stop_flag();
    orchestrator
        .add_event_handler(move |event| {
            if let PipelineEvent::StageCompleted {
                stage: Stage::LinkedinResolution,
                ..
            } = event
            {
                stop.request_stop();
            }
        })
        .await;
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.status, RunStatus::Stopped);
    assert!(matches!(outcome.error, Some(StageError::UserStop)));
    assert_eq!(outcome.halted_at, Some(Stage::CompanyExport));

    assert_status(&ctx, Stage::CompanySearch, StepStatus::Completed);
    assert_status(&ctx, Stage::LinkedinResolution, StepStatus::Completed);
    assert_status(&ctx, Stage::CompanyExport, StepStatus::Failed);
    let record = ctx.tracker.record(Stage::CompanyExport).unwrap();
    assert_eq!(record.error_message(), Some("stopped by user"));
    assert!(record.started_at().is_none());
    assert_pending_from(&ctx, Stage::EmployeeExtraction);

    // the stopped stage never ran
    assert!(outcome.companies_csv.is_none());
    assert!(fakes.extractor.submitted().is_empty());
}

/// The stop flag does not leak into the next run
#[tokio::test]
async fn test_next_run_starts_clean() {
    let fakes = Fakes::new(companies(1, 1));
    let orchestrator = fakes.orchestrator(test_options());
    orchestrator.stop_flag().request_stop();
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.status, RunStatus::Completed);
}

/// Events for a stopped run end with the stopped stage and the run result
#[tokio::test]
async fn test_stop_events() {
    let fakes = Fakes::new(companies(1, 1));
    let orchestrator = fakes.orchestrator(test_options());
    let events = record_events(&orchestrator).await;
    let stop = orchestrator.stop_flag();
    orchestrator
        .add_event_handler(move |event| {
            if matches!(event, PipelineEvent::StageCompleted { stage: Stage::CompanySearch, .. }) {
                stop.request_stop();
            }
        })
        .await;
    let mut ctx = orchestrator.new_context();

    orchestrator.run(&mut ctx).await;

    let events = events.lock().unwrap().clone();
    let n = events.len();
    assert_eq!(
        events[n - 2],
        PipelineEvent::StageFailed {
            stage: Stage::LinkedinResolution,
            error: "stopped by user".to_string(),
        }
    );
    assert!(matches!(
        events[n - 1],
        PipelineEvent::RunFinished {
            status: RunStatus::Stopped,
            ..
        }
    ));
}
