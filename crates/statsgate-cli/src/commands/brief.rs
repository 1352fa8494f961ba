//! Brief command - a combined look at two competitors
//!
//! Provides the `statsgate brief <a> <b>` CLI command which:
//! 1. Fetches rankings, both profiles and the head-to-head record concurrently
//! 2. Renders each data point independently; a failed one is shown as
//!    unavailable with its reason while the others are still printed
//! 3. Reports the quota used by the whole command

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use statsgate_client::{
    meter::UsageDelta,
    models::{CompetitorProfile, HeadToHead, Rankings},
    ApiError, StatsClient,
};
use statsgate_core::domain::CompetitorId;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{
    query::{render_head_to_head, render_profile, render_rankings},
    Session,
};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct BriefCommand {
    /// First competitor
    pub a: CompetitorId,
    /// Second competitor
    pub b: CompetitorId,
    /// Endpoints to list in the usage report
    #[arg(long, default_value_t = 5)]
    pub top: usize,
}

/// Outcome of one data point within a brief.
#[derive(Debug)]
pub enum DataPoint<T> {
    Available(T),
    /// The API has nothing for this query
    Absent,
    Unavailable(String),
}

impl<T> DataPoint<T> {
    fn from_result(name: &str, result: Result<Option<T>, ApiError>) -> Self {
        match result {
            Ok(Some(value)) => DataPoint::Available(value),
            Ok(None) => DataPoint::Absent,
            Err(e) => {
                warn!(data_point = name, error = %e, "Data point unavailable");
                DataPoint::Unavailable(e.to_string())
            }
        }
    }
}

impl<T: Serialize> DataPoint<T> {
    fn to_json(&self) -> serde_json::Value {
        match self {
            DataPoint::Available(value) => serde_json::to_value(value)
                .unwrap_or_else(|e| serde_json::json!({ "unavailable": e.to_string() })),
            DataPoint::Absent => serde_json::Value::Null,
            DataPoint::Unavailable(reason) => serde_json::json!({ "unavailable": reason }),
        }
    }
}

/// Everything a brief shows.
#[derive(Debug)]
pub struct Brief {
    pub rankings: DataPoint<Rankings>,
    pub profile_a: DataPoint<CompetitorProfile>,
    pub profile_b: DataPoint<CompetitorProfile>,
    pub head_to_head: DataPoint<HeadToHead>,
    pub usage: UsageDelta,
}

impl Brief {
    /// Fetch all data points concurrently and attribute their cost.
    pub async fn gather(
        client: &StatsClient,
        a: &CompetitorId,
        b: &CompetitorId,
        top: usize,
        cancel: &CancellationToken,
    ) -> Self {
        let before = client.meter().snapshot();

        let (rankings, profile_a, profile_b, head_to_head) = tokio::join!(
            client.rankings(cancel),
            client.competitor_profile(a, cancel),
            client.competitor_profile(b, cancel),
            client.versus(a, b, cancel),
        );

        let usage = client.meter().delta_since(&before, top);
        info!(
            requests = usage.requests,
            throttled = usage.status_429,
            "Brief complete"
        );

        Self {
            rankings: DataPoint::from_result("rankings", rankings),
            profile_a: DataPoint::from_result("profile_a", profile_a),
            profile_b: DataPoint::from_result("profile_b", profile_b),
            head_to_head: DataPoint::from_result("head_to_head", head_to_head),
            usage,
        }
    }

    fn to_json(&self, a: &CompetitorId, b: &CompetitorId) -> Result<serde_json::Value> {
        let mut profiles = serde_json::Map::new();
        profiles.insert(a.to_string(), self.profile_a.to_json());
        profiles.insert(b.to_string(), self.profile_b.to_json());

        Ok(serde_json::json!({
            "competitors": [a.as_str(), b.as_str()],
            "rankings": self.rankings.to_json(),
            "profiles": profiles,
            "head_to_head": self.head_to_head.to_json(),
            "usage": serde_json::to_value(&self.usage).context("Failed to serialize usage")?,
        }))
    }
}

impl BriefCommand {
    /// Execute the brief command
    pub async fn execute(&self, session: &Session, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let brief = Brief::gather(&session.client, &self.a, &self.b, self.top, &session.cancel).await;

        if format.is_json() {
            formatter.print_json(&brief.to_json(&self.a, &self.b)?);
            return Ok(());
        }

        formatter.success(&format!("Brief: {} vs {}", self.a, self.b));

        formatter.info("");
        formatter.info("Rankings");
        render_point(formatter.as_ref(), &brief.rankings, |f, r| {
            render_rankings(f, r, Some(&self.a), 0);
            render_rankings(f, r, Some(&self.b), 0);
        });

        for (id, profile) in [(&self.a, &brief.profile_a), (&self.b, &brief.profile_b)] {
            formatter.info("");
            formatter.info(&format!("Profile {id}"));
            render_point(formatter.as_ref(), profile, render_profile);
        }

        formatter.info("");
        formatter.info("Head-to-head");
        render_point(formatter.as_ref(), &brief.head_to_head, |f, h| {
            render_head_to_head(f, h, self.a.as_str(), self.b.as_str())
        });

        formatter.info("");
        render_usage(formatter.as_ref(), &brief.usage);
        Ok(())
    }
}

fn render_point<T>(
    formatter: &dyn OutputFormatter,
    point: &DataPoint<T>,
    render: impl FnOnce(&dyn OutputFormatter, &T),
) {
    match point {
        DataPoint::Available(value) => render(formatter, value),
        DataPoint::Absent => formatter.info("no data"),
        DataPoint::Unavailable(reason) => formatter.info(&format!("unavailable: {reason}")),
    }
}

fn render_usage(formatter: &dyn OutputFormatter, usage: &UsageDelta) {
    formatter.info("Usage");
    formatter.field("Requests", &usage.requests.to_string());
    formatter.field("Throttled", &usage.status_429.to_string());
    formatter.field("Avg latency", &format!("{:.1} ms", usage.avg_latency_ms));
    for (endpoint, count) in &usage.top_endpoints {
        formatter.info(&format!("  {count:>4}  {endpoint}"));
    }
}
