//! CLI output formatting

use crate::{
    core::{RunStatus, Stage, StepStatus, StepTracker},
    execution::{PipelineEvent, RunOutcome},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar over the run's stages
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(bar_style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a stage status for display
pub fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::Pending => style("PENDING").dim().to_string(),
        StepStatus::Running => style("RUNNING").yellow().to_string(),
        StepStatus::Completed => style("COMPLETED").green().to_string(),
        StepStatus::Failed => style("FAILED").red().to_string(),
        StepStatus::Skipped => style("SKIPPED").dim().to_string(),
    }
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Completed => style("COMPLETED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Stopped => style("STOPPED").yellow().to_string(),
    }
}

/// Format a pipeline event for display
pub fn format_pipeline_event(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::RunStarted { run_id, stages } => format!(
            "{} Starting run {} ({} stages)",
            ROCKET,
            style(&run_id.to_string()[..8]).dim(),
            stages.len()
        ),
        PipelineEvent::StageStarted { stage } => {
            format!("{} {}", SPINNER, style(stage).cyan())
        }
        PipelineEvent::StageCompleted {
            stage,
            result_count,
        } => format!(
            "{} {} ({} results)",
            CHECK,
            style(stage).green(),
            style(result_count).bold()
        ),
        PipelineEvent::StageFailed { stage, error } => {
            format!("{} {}: {}", CROSS, style(stage).red(), style(error).dim())
        }
        PipelineEvent::StageSkipped { stage, reason } => {
            format!("{} {} ({})", SKIP, style(stage).dim(), reason)
        }
        PipelineEvent::RunFinished { run_id, status } => format!(
            "{} Run {} {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// One line per tracked stage with its status and count
pub fn format_step_table(tracker: &StepTracker) -> String {
    tracker
        .iter()
        .map(|(stage, record)| {
            let mut line = format!(
                "  {:<28} {:<10} {:>5}",
                stage.to_string(),
                format_step_status(record.status()),
                record.result_count()
            );
            if let Some(error) = record.error_message() {
                line.push_str(&format!("  {}", style(error).red()));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The stage list printed by `leadflow steps`
pub fn format_stage_list(stages: &[Stage]) -> String {
    stages
        .iter()
        .map(|stage| {
            let optional = if stage.is_optional() { " (optional)" } else { "" };
            format!(
                "  {:<28} {}{}",
                stage.to_string(),
                style(stage.description()).dim(),
                optional
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Final run summary
pub fn format_outcome(outcome: &RunOutcome) -> String {
    let mut lines = Vec::new();
    let icon = if outcome.is_success() { CHECK } else { CROSS };
    lines.push(format!(
        "{} Run {} in {}",
        icon,
        format_status(outcome.status),
        style(format_duration(outcome.duration)).dim()
    ));

    if let (Some(stage), Some(error)) = (outcome.halted_at, outcome.error.as_ref()) {
        lines.push(format!("  Halted at {}: {}", style(stage).bold(), style(error).red()));
    }

    lines.push(format!("  Companies: {}", style(outcome.companies).cyan()));
    lines.push(format!(
        "  Decision makers: {}",
        style(outcome.decision_makers).cyan()
    ));
    lines.push(format!(
        "  Enriched contacts: {} ({} with email)",
        style(outcome.enriched_contacts).cyan(),
        style(outcome.contacts_with_email).cyan()
    ));
    if let Some(path) = &outcome.companies_csv {
        lines.push(format!("  Companies CSV: {}", style(path.display()).dim()));
    }
    if let Some(path) = &outcome.contacts_csv {
        lines.push(format!("  Contacts CSV: {}", style(path.display()).dim()));
    }

    lines.join("\n")
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
