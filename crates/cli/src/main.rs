//! SearchPerf CLI - Main Entry Point
//!
//! `run` collects timings, `aggregate` turns a timing log into the CSV report,
//! and `profiles`, `queries`, `decode` inspect the building blocks.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use searchperf_cli::commands::{aggregate, decode, profiles, queries, run};
use searchperf_cli::config::{PerfConfig, DEFAULT_CONFIG_FILE};
use searchperf_cli::output::{self, print_error};

/// SearchPerf - search performance timing for the ADS applications
#[derive(Parser)]
#[command(name = "searchperf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true, env = "SEARCHPERF_CONFIG")]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Time search scenarios in real browsers
    Run(run::RunArgs),

    /// Aggregate a timing log into the CSV report
    Aggregate(aggregate::AggregateArgs),

    /// List throttle profiles
    Profiles,

    /// List the query catalog
    Queries(queries::QueriesArgs),

    /// Decode an encoded sample name
    Decode(decode::DecodeArgs),
}

/// Exit status of `run` when at least one scenario failed
const EXIT_SCENARIO_FAILED: u8 = 1;

/// Exit status for configuration and other fatal errors
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let config = match PerfConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            print_error(&format!("Invalid configuration {}: {:#}", cli.config.display(), e));
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let result = match cli.command {
        Commands::Run(args) => match run::execute(args, config, cli.format).await {
            Ok(true) => Ok(()),
            Ok(false) => return ExitCode::from(EXIT_SCENARIO_FAILED),
            Err(e) => {
                print_error(&format!("{:#}", e));
                return ExitCode::from(EXIT_FATAL);
            }
        },
        Commands::Aggregate(args) => aggregate::execute(args, config, cli.format).await,
        Commands::Profiles => profiles::execute(cli.format).await,
        Commands::Queries(args) => queries::execute(args, config, cli.format).await,
        Commands::Decode(args) => decode::execute(args, cli.format).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
