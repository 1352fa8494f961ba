//! statsgate CLI - query a rate-limited sports statistics API
//!
//! Provides commands for:
//! - Each typed read operation (rankings, schedules, summaries, seasons,
//!   profiles, head-to-head)
//! - A `brief` that combines several reads and reports their quota cost
//! - Viewing and validating configuration
//!
//! Every request goes through the quota governor configured in the
//! `rate_limiting` section, so the CLI never exceeds the trial-tier budget.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use statsgate_core::config::Config;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{brief::BriefCommand, config::ConfigCommand, query::QueryCommand, Session};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "statsgate",
    version,
    about = "Quota-governed client for a sports statistics API"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Query(QueryCommand),
    /// Rankings, profiles and head-to-head for two competitors at once
    Brief(BriefCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path);
    config.apply_env_overrides();

    // Setup tracing; logs go to stderr so --json output stays parseable
    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human { quiet: cli.quiet }
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling outstanding requests");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
        Commands::Query(cmd) => {
            let session = Session::open(&config, cancel)?;
            let outcome = cmd.execute(&session, format).await;
            session.finish(cli.metrics, outcome)
        }
        Commands::Brief(cmd) => {
            let session = Session::open(&config, cancel)?;
            let outcome = cmd.execute(&session, format).await;
            session.finish(cli.metrics, outcome)
        }
    }
}
