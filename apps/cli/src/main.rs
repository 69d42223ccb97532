//! ClaimGuard CLI
//!
//! The `claimguard` command trains the vehicle-insurance claim classifier,
//! inspects the deployed champion and scores single records against it.

mod commands;

use clap::{Parser, Subcommand};
use claimguard_pipeline::PipelineError;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

/// Exit status for a run stopped by data validation.
const EXIT_VALIDATION_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "claimguard",
    author,
    version,
    about = "ClaimGuard - vehicle insurance claim classifier",
    long_about = "Trains, evaluates and promotes a binary classifier predicting whether a driver will file a vehicle insurance claim."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full training pipeline
    ///
    /// Ingests the dataset, validates it against the schema, encodes and
    /// rebalances it, grid-searches the candidate models and promotes the
    /// winner if it beats the current champion.
    Train {
        /// Output the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score one claim record against the champion
    Predict {
        /// JSON file holding a single claim record
        record: PathBuf,

        /// Output the prediction as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the champion model held by the registry
    Champion {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let level = match log_level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PipelineError>() {
        Some(pipeline_err) if pipeline_err.is_validation_failure() => EXIT_VALIDATION_FAILED,
        _ => 1,
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = args.config.as_deref();
    match args.command {
        Command::Train { json } => commands::train::execute(config, json),
        Command::Predict { record, json } => commands::predict::execute(config, &record, json),
        Command::Champion { json } => commands::champion::execute(config, json),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_tracing(&args.log_level) {
        eprintln!("{} {err:#}", "error:".red().bold());
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "command failed");
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(exit_code(&err))
        }
    }
}
