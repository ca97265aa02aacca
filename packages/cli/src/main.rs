#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the UK solicitors register pipeline.
//!
//! Collects the SRA organisation dataset, re-validates stored data,
//! generates the distribution artifacts and verifies them.
//!
//! Uses `indicatif-log-bridge` (via [`uk_solicitors_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uk_solicitors_config::{DEFAULT_SETTINGS_PATH, Settings};

#[derive(Parser)]
#[command(name = "uk_solicitors", about = "UK solicitors register pipeline")]
struct Cli {
    /// Settings file (TOML). Missing keys fall back to built-in defaults.
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,
    /// Log at debug level unless `RUST_LOG` is set
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, validate and persist the full organisation dataset
    Collect {
        /// Load the previous collection state before fetching again
        #[arg(long)]
        resume: bool,
    },
    /// Show the state of the last collection
    Status,
    /// Check that the registry API is reachable with the configured key
    TestConnection,
    /// Print the effective API client configuration
    ApiInfo,
    /// Re-validate a stored dataset without fetching
    Validate {
        /// Dataset file (defaults to the most recent collection)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Generate distribution artifacts from a collected dataset
    Generate {
        /// Dataset file (defaults to the most recent collection)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output directory (defaults to `paths.output_dir`)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Verify generated artifacts
    Verify {
        /// Output directory (defaults to `paths.output_dir`)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let multi = uk_solicitors_cli_utils::init_logger(if cli.verbose { "debug" } else { "info" });

    let settings = Settings::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Collect { resume } => commands::collect(&settings, &multi, resume).await?,
        Commands::Status => commands::status(&settings)?,
        Commands::TestConnection => commands::test_connection(&settings).await?,
        Commands::ApiInfo => commands::api_info(&settings)?,
        Commands::Validate { file } => commands::validate(&settings, file.as_deref())?,
        Commands::Generate { input, output } => {
            commands::generate(&settings, &multi, input.as_deref(), output.as_deref())?;
        }
        Commands::Verify { dir } => commands::verify(&settings, dir.as_deref())?,
    }

    Ok(())
}
