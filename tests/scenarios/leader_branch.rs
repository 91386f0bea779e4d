//! Test: skip_extraction derives decision makers from registry leaders

use crate::helpers::*;
use leadflow::core::{Stage, StepStatus, LEADER_PERSONA};
use leadflow::{RunOptions, RunStatus, StageError};
use std::sync::Arc;

fn branch_options() -> RunOptions {
    RunOptions {
        skip_extraction: true,
        ..test_options()
    }
}

/// 3 companies with 2 leaders each yield 6 decision makers
#[tokio::test]
async fn test_leaders_become_decision_makers() {
    let fakes = Fakes::new(companies(3, 2));
    let orchestrator = fakes.orchestrator(branch_options());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_status(&ctx, Stage::EmployeeExtraction, StepStatus::Skipped);
    assert!(has_log(&ctx, Stage::EmployeeExtraction, "skipped:"));
    assert_status(&ctx, Stage::DecisionMakerFilter, StepStatus::Completed);
    assert_count(&ctx, Stage::DecisionMakerFilter, 6);

    assert_eq!(ctx.decision_makers.len(), 6);
    assert!(ctx
        .decision_makers
        .iter()
        .all(|c| c.persona_type.as_deref() == Some(LEADER_PERSONA)));
    assert_eq!(
        ctx.decision_makers
            .iter()
            .filter(|c| c.siren == "100000002")
            .count(),
        2
    );

    // no extraction job was ever submitted
    assert!(fakes.extractor.submitted().is_empty());
    assert!(ctx.company_employees.is_empty());

    assert_status(&ctx, Stage::ContactEnrichment, StepStatus::Completed);
    assert_count(&ctx, Stage::ContactEnrichment, 6);
    assert_status(&ctx, Stage::ContactExport, StepStatus::Completed);
    assert_eq!(outcome.decision_makers, 6);
    assert_eq!(outcome.contacts_with_email, 6);
}

/// Companies without leaders leave nothing to filter
#[tokio::test]
async fn test_no_leaders_fails_stage_five() {
    let fakes = Fakes::new(companies(2, 0));
    let orchestrator = fakes.orchestrator(branch_options());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(matches!(
        outcome.error,
        Some(StageError::EmptyResult(Stage::DecisionMakerFilter))
    ));
    assert_status(&ctx, Stage::EmployeeExtraction, StepStatus::Skipped);
    assert_status(&ctx, Stage::DecisionMakerFilter, StepStatus::Failed);
    assert_pending_from(&ctx, Stage::ContactEnrichment);
}

/// Registry leaders do not need LinkedIn pages
#[tokio::test]
async fn test_branch_runs_without_linkedin_pages() {
    let mut fakes = Fakes::new(companies(3, 2));
    fakes.resolver = Arc::new(FakeResolver {
        missing: ["100000001", "100000002", "100000003"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ..Default::default()
    });
    let orchestrator = fakes.orchestrator(branch_options());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_status(&ctx, Stage::LinkedinResolution, StepStatus::Completed);
    assert_count(&ctx, Stage::LinkedinResolution, 0);
    assert_status(&ctx, Stage::EmployeeExtraction, StepStatus::Skipped);
    assert_status(&ctx, Stage::DecisionMakerFilter, StepStatus::Completed);
    assert_count(&ctx, Stage::DecisionMakerFilter, 6);
}
