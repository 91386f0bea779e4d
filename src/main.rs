use anyhow::{Context, Result};
use leadflow::cli::commands::{RunCommand, StepsCommand, ValidateCommand};
use leadflow::cli::output::*;
use leadflow::cli::{Cli, Command};
use leadflow::execution::{Orchestrator, PipelineEvent, RunOptions};
use leadflow::providers::{csv_export::read_companies, ProviderSet};
use leadflow::{LeadflowConfig, Stage};
use tracing::{warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_config(cmd)?,
        Command::Steps(cmd) => list_steps(cmd),
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<LeadflowConfig> {
    match path {
        Some(path) => LeadflowConfig::from_file(path).context("Failed to load configuration"),
        None => LeadflowConfig::from_env().context("Failed to load configuration from environment"),
    }
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let mut config = load_config(cmd.config.as_deref())?;
    if cmd.max_entities.is_some() {
        config.run.max_entities = cmd.max_entities;
    }
    if cmd.skip_extraction {
        config.run.skip_extraction = true;
    }

    let providers = ProviderSet::from_config(&config).context("Failed to build provider clients")?;
    let mut options = RunOptions::from_config(&config);
    if cmd.no_sinks {
        options.track_sinks = false;
    }

    let orchestrator = Orchestrator::new(providers, options);
    let mut ctx = orchestrator.new_context();

    // Set up event handler for console output
    let progress = create_progress_bar(ctx.tracker.len());
    let bar = progress.clone();
    orchestrator
        .add_event_handler(move |event| {
            match &event {
                PipelineEvent::StageStarted { stage } => bar.set_message(stage.name()),
                PipelineEvent::StageCompleted { .. }
                | PipelineEvent::StageFailed { .. }
                | PipelineEvent::StageSkipped { .. } => bar.inc(1),
                _ => {}
            }
            bar.println(format_pipeline_event(&event));
        })
        .await;

    let stop = orchestrator.stop_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Stop requested, the run halts after the current stage");
            stop.request_stop();
        }
    });

    let outcome = match &cmd.from_csv {
        Some(path) => {
            let companies = read_companies(path)
                .with_context(|| format!("Failed to read companies from {}", path.display()))?;
            println!(
                "{} Resuming from {} ({} companies)",
                INFO,
                style(path.display()).bold(),
                companies.len()
            );
            orchestrator
                .resume_from_companies(&mut ctx, companies, path.clone())
                .await
        }
        None => orchestrator.run(&mut ctx).await,
    };
    progress.finish_and_clear();

    println!("\n{}", format_step_table(&ctx.tracker));
    println!("\n{}", format_outcome(&outcome));

    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn validate_config(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating configuration...", INFO);

    match LeadflowConfig::from_file(&cmd.config) {
        Ok(config) => {
            let stages = if config.has_optional_sinks() {
                Stage::ALL.len()
            } else {
                Stage::CORE.len()
            };
            println!("{} Configuration is valid!", CHECK);
            println!("  Stages: {}", style(stages).cyan());
            println!("  Workers: {}", style(config.run.max_workers).cyan());
            println!(
                "  Spreadsheet sync: {}",
                style(if config.sheets.is_some() { "on" } else { "off" }).dim()
            );
            println!(
                "  Campaign push: {}",
                style(if config.emelia.is_some() { "on" } else { "off" }).dim()
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(&config.redacted())?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn list_steps(cmd: &StepsCommand) {
    let stages: &[Stage] = if cmd.all { &Stage::ALL } else { &Stage::CORE };
    println!("{} Pipeline stages:", INFO);
    println!("{}", format_stage_list(stages));
}
