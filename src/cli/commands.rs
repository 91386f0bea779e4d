//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run the pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the YAML configuration; credentials may come from the environment alone
    #[arg(short, long)]
    pub config: Option<String>,

    /// Maximum number of companies to process
    #[arg(short = 'n', long)]
    pub max_entities: Option<usize>,

    /// Use registry leaders instead of scraping LinkedIn employees
    #[arg(long)]
    pub skip_extraction: bool,

    /// Load companies from an exported companies CSV and start at employee extraction
    #[arg(long)]
    pub from_csv: Option<PathBuf>,

    /// Do not track the spreadsheet and campaign stages
    #[arg(long)]
    pub no_sinks: bool,
}

/// Validate a configuration file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the YAML configuration
    #[arg(short, long)]
    pub config: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Print the pipeline stages
#[derive(Debug, Args, Clone)]
pub struct StepsCommand {
    /// Include the optional sink stages
    #[arg(long)]
    pub all: bool,
}
