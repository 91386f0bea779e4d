//! Test: hard-stage failures halt the run and leave later stages pending

use crate::helpers::*;
use leadflow::core::{Stage, StepStatus};
use leadflow::{RunStatus, StageError};
use std::sync::Arc;

/// Empty company search halts at stage 1
#[tokio::test]
async fn test_empty_search_halts_run() {
    let fakes = Fakes::new(Vec::new());
    let orchestrator = fakes.orchestrator(test_options());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(!outcome.is_success());
    assert_eq!(outcome.halted_at, Some(Stage::CompanySearch));
    assert!(matches!(
        outcome.error,
        Some(StageError::EmptyResult(Stage::CompanySearch))
    ));

    assert_status(&ctx, Stage::CompanySearch, StepStatus::Failed);
    let record = ctx.tracker.record(Stage::CompanySearch).unwrap();
    assert!(record.error_message().unwrap().contains("no results"));
    assert_pending_from(&ctx, Stage::LinkedinResolution);
    assert_eq!(ctx.tracker.len(), 7);
    assert!(fakes.extractor.submitted().is_empty());
    assert!(outcome.companies_csv.is_none());
}

/// A transport error in search fails stage 1 with the provider's message
#[tokio::test]
async fn test_search_error_halts_run() {
    let mut fakes = Fakes::new(companies(3, 1));
    fakes.companies = Arc::new(FakeCompanies {
        error: Some("registry unavailable".to_string()),
        ..FakeCompanies::new(Vec::new())
    });
    let orchestrator = fakes.orchestrator(test_options());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(matches!(outcome.error, Some(StageError::Transport(_))));
    let record = ctx.tracker.record(Stage::CompanySearch).unwrap();
    assert!(record
        .error_message()
        .unwrap()
        .contains("registry unavailable"));
    assert_pending_from(&ctx, Stage::LinkedinResolution);
}

/// No company resolves to a LinkedIn page: extraction has nothing to work on
#[tokio::test]
async fn test_no_linkedin_pages_halts_at_extraction() {
    let mut fakes = Fakes::new(companies(2, 1));
    fakes.resolver = Arc::new(FakeResolver {
        missing: ["100000001".to_string()].into_iter().collect(),
        failing: ["100000002".to_string()].into_iter().collect(),
    });
    let orchestrator = fakes.orchestrator(test_options());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.halted_at, Some(Stage::EmployeeExtraction));
    assert!(matches!(
        outcome.error,
        Some(StageError::EmptyResult(Stage::EmployeeExtraction))
    ));
    assert_count(&ctx, Stage::CompanySearch, 2);
    assert_status(&ctx, Stage::LinkedinResolution, StepStatus::Completed);
    assert_count(&ctx, Stage::LinkedinResolution, 0);
    assert_status(&ctx, Stage::CompanyExport, StepStatus::Completed);
    assert_status(&ctx, Stage::EmployeeExtraction, StepStatus::Failed);
    assert_pending_from(&ctx, Stage::DecisionMakerFilter);
    assert!(fakes.extractor.submitted().is_empty());
    // entities from completed stages are kept
    assert_eq!(ctx.companies.len(), 2);
}

/// Every extraction job fails: stage 4 has no companies with employees
#[tokio::test]
async fn test_all_extractions_failing_halts_at_stage_four() {
    let mut fakes = Fakes::new(companies(2, 1));
    let mut extractor = FakeExtractor::new(4);
    extractor.failing = ["100000001", "100000002"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    fakes.extractor = Arc::new(extractor);
    let orchestrator = fakes.orchestrator(test_options());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.halted_at, Some(Stage::EmployeeExtraction));
    assert_status(&ctx, Stage::CompanyExport, StepStatus::Completed);
    assert_status(&ctx, Stage::EmployeeExtraction, StepStatus::Failed);
    assert!(has_log(&ctx, Stage::EmployeeExtraction, "agent crashed"));
    assert_pending_from(&ctx, Stage::DecisionMakerFilter);
}

/// The filter failing for every company surfaces its error
#[tokio::test]
async fn test_filter_errors_without_shortlist_fail_stage_five() {
    let mut fakes = Fakes::new(companies(1, 1));
    let mut filter = FakeFilter::new(2);
    filter.failing.insert("Company 1".to_string());
    fakes.filter = Arc::new(filter);
    let orchestrator = fakes.orchestrator(test_options());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.halted_at, Some(Stage::DecisionMakerFilter));
    assert!(matches!(outcome.error, Some(StageError::Transport(_))));
    assert_status(&ctx, Stage::DecisionMakerFilter, StepStatus::Failed);
    assert_pending_from(&ctx, Stage::ContactEnrichment);
}
