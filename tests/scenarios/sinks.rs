//! Test: optional spreadsheet and campaign stages

use crate::helpers::*;
use leadflow::core::{Stage, StepStatus};
use leadflow::{PipelineEvent, RunOptions, RunStatus};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn with_sinks() -> RunOptions {
    RunOptions {
        skip_extraction: true,
        track_sinks: true,
        ..test_options()
    }
}

/// Both sinks configured: nine stages, all completed
#[tokio::test]
async fn test_configured_sinks_run() {
    let mut fakes = Fakes::new(companies(2, 2));
    fakes.sheet = Some(Arc::new(RecordingSheet::default()));
    fakes.campaign = Some(Arc::new(RecordingCampaign::default()));
    let orchestrator = fakes.orchestrator(with_sinks());
    let mut ctx = orchestrator.new_context();
    assert_eq!(ctx.tracker.len(), 9);

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_status(&ctx, Stage::SpreadsheetSync, StepStatus::Completed);
    assert_count(&ctx, Stage::SpreadsheetSync, 2 + 4);
    assert_status(&ctx, Stage::CampaignPush, StepStatus::Completed);
    assert_count(&ctx, Stage::CampaignPush, 4);

    let sheet = fakes.sheet.as_ref().unwrap();
    assert_eq!(sheet.companies.load(Ordering::SeqCst), 2);
    assert_eq!(sheet.contacts.load(Ordering::SeqCst), 4);
    let pushed = fakes.campaign.as_ref().unwrap().pushed.lock().unwrap().clone();
    assert!(pushed.iter().all(|c| c.has_email()));
}

/// Tracked but unconfigured sinks are skipped
#[tokio::test]
async fn test_unconfigured_sinks_are_skipped() {
    let fakes = Fakes::new(companies(1, 1));
    let orchestrator = fakes.orchestrator(with_sinks());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert!(outcome.is_success());
    assert_status(&ctx, Stage::SpreadsheetSync, StepStatus::Skipped);
    assert_status(&ctx, Stage::CampaignPush, StepStatus::Skipped);
    assert!(has_log(&ctx, Stage::CampaignPush, "not configured"));
}

/// A failing sink is reported but the run still succeeds
#[tokio::test]
async fn test_failing_sink_is_soft() {
    let mut fakes = Fakes::new(companies(1, 2));
    fakes.sheet = Some(Arc::new(RecordingSheet {
        fail: true,
        ..Default::default()
    }));
    fakes.campaign = Some(Arc::new(RecordingCampaign::default()));
    let orchestrator = fakes.orchestrator(with_sinks());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.status, RunStatus::Completed);
    assert!(outcome.error.is_none());
    assert_status(&ctx, Stage::SpreadsheetSync, StepStatus::Failed);
    let record = ctx.tracker.record(Stage::SpreadsheetSync).unwrap();
    assert!(record.error_message().unwrap().contains("403"));
    // the run continued past the failed sink
    assert_status(&ctx, Stage::CampaignPush, StepStatus::Completed);
}

/// A sink that never answers is skipped, not failed
#[tokio::test]
async fn test_timed_out_sink_is_skipped() {
    let mut fakes = Fakes::new(companies(1, 2));
    fakes.sheet = Some(Arc::new(RecordingSheet {
        timeout: true,
        ..Default::default()
    }));
    fakes.campaign = Some(Arc::new(RecordingCampaign::default()));
    let orchestrator = fakes.orchestrator(with_sinks());
    let events = record_events(&orchestrator).await;
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_status(&ctx, Stage::SpreadsheetSync, StepStatus::Skipped);
    assert!(has_log(&ctx, Stage::SpreadsheetSync, "did not answer in time"));
    let record = ctx.tracker.record(Stage::SpreadsheetSync).unwrap();
    assert!(record.started_at().is_some());
    assert!(record.error_message().is_none());
    assert!(events.lock().unwrap().iter().any(|e| matches!(
        e,
        PipelineEvent::StageSkipped {
            stage: Stage::SpreadsheetSync,
            ..
        }
    )));
    assert_status(&ctx, Stage::CampaignPush, StepStatus::Completed);
}

/// Nothing with an email means nothing to push
#[tokio::test]
async fn test_campaign_skipped_without_emails() {
    // a single-word leader name cannot be enriched
    let mut company = company("100000001", "Solo", 0);
    company.leaders.push(leadflow::core::Leader {
        name: "Madonna".to_string(),
        role: "Gérante".to_string(),
        birth_date: None,
    });
    let mut fakes = Fakes::new(vec![company]);
    fakes.campaign = Some(Arc::new(RecordingCampaign::default()));
    let orchestrator = fakes.orchestrator(with_sinks());
    let mut ctx = orchestrator.new_context();

    let outcome = orchestrator.run(&mut ctx).await;

    assert!(outcome.is_success());
    assert_count(&ctx, Stage::ContactEnrichment, 0);
    assert_status(&ctx, Stage::CampaignPush, StepStatus::Skipped);
    assert!(fakes.campaign.as_ref().unwrap().pushed.lock().unwrap().is_empty());
}
