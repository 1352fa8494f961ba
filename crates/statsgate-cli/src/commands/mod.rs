//! CLI subcommands
//!
//! Query and brief commands share a [`Session`]: one governed client and
//! the cancellation token wired to Ctrl-C.

pub mod brief;
pub mod config;
pub mod query;

use anyhow::{Context, Result};
use statsgate_client::StatsClient;
use statsgate_core::config::Config;
use statsgate_telemetry::MetricsRegistry;
use tokio_util::sync::CancellationToken;

/// A governed client plus the token that cancels its outstanding work.
pub struct Session {
    pub client: StatsClient,
    pub cancel: CancellationToken,
}

impl Session {
    pub fn open(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let client =
            StatsClient::from_config(config).context("Failed to build statistics client")?;
        Ok(Self { client, cancel })
    }

    /// Print the metrics exposition if asked to, then hand back the
    /// command's own outcome.
    pub fn finish(&self, metrics: bool, outcome: Result<()>) -> Result<()> {
        if metrics {
            let registry = MetricsRegistry::new().context("Failed to create metrics registry")?;
            registry.record_client(&self.client);
            print!("{}", registry.encode()?);
        }
        outcome
    }
}
