//! Query commands - one per typed client operation
//!
//! Each command fetches a single resource through the governed client and
//! prints it. An absent resource (404 or empty payload) is reported as a
//! warning rather than an error.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use statsgate_client::models::{
    CompetitorProfile, DailySchedule, HeadToHead, Rankings, Seasons, SportEvent, SportEventSummary,
};
use statsgate_core::domain::{CompetitorId, ScheduleDate, SportEventId};
use tracing::info;

use super::Session;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum QueryCommand {
    /// Show current rankings
    Rankings {
        /// Only show this competitor's standing
        #[arg(long)]
        competitor: Option<CompetitorId>,
        /// Entries to show per ranking table
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show the event schedule for a day (YYYY-MM-DD, defaults to today)
    Schedule { date: Option<ScheduleDate> },
    /// Show the summary of a single sport event
    Summary { event: SportEventId },
    /// List available seasons
    Seasons,
    /// Show a competitor profile
    Profile { competitor: CompetitorId },
    /// Show the head-to-head record of two competitors
    Versus { a: CompetitorId, b: CompetitorId },
}

impl QueryCommand {
    /// Execute the query command
    pub async fn execute(&self, session: &Session, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let client = &session.client;
        let cancel = &session.cancel;

        match self {
            QueryCommand::Rankings { competitor, limit } => {
                let rankings = client
                    .rankings(cancel)
                    .await
                    .context("Failed to fetch rankings")?;
                emit(formatter.as_ref(), format, "Rankings", rankings, |f, r| {
                    render_rankings(f, r, competitor.as_ref(), *limit)
                })
            }
            QueryCommand::Schedule { date } => {
                let date = (*date).unwrap_or_else(ScheduleDate::today);
                info!(%date, "Fetching daily schedule");
                let schedule = client
                    .daily_schedule(&date, cancel)
                    .await
                    .with_context(|| format!("Failed to fetch schedule for {date}"))?;
                let what = format!("Schedule for {date}");
                emit(formatter.as_ref(), format, &what, schedule, render_schedule)
            }
            QueryCommand::Summary { event } => {
                let summary = client
                    .sport_event_summary(event, cancel)
                    .await
                    .with_context(|| format!("Failed to fetch summary of {event}"))?;
                let what = format!("Summary of {event}");
                emit(formatter.as_ref(), format, &what, summary, render_summary)
            }
            QueryCommand::Seasons => {
                let seasons = client
                    .seasons(cancel)
                    .await
                    .context("Failed to fetch seasons")?;
                emit(formatter.as_ref(), format, "Seasons", seasons, render_seasons)
            }
            QueryCommand::Profile { competitor } => {
                let profile = client
                    .competitor_profile(competitor, cancel)
                    .await
                    .with_context(|| format!("Failed to fetch profile of {competitor}"))?;
                let what = format!("Profile of {competitor}");
                emit(formatter.as_ref(), format, &what, profile, render_profile)
            }
            QueryCommand::Versus { a, b } => {
                let record = client
                    .versus(a, b, cancel)
                    .await
                    .with_context(|| format!("Failed to fetch {a} versus {b}"))?;
                let what = format!("Head-to-head of {a} and {b}");
                emit(formatter.as_ref(), format, &what, record, |f, h| {
                    render_head_to_head(f, h, a.as_str(), b.as_str())
                })
            }
        }
    }
}

/// Print a fetched value as JSON or through `render`.
fn emit<T: Serialize>(
    formatter: &dyn OutputFormatter,
    format: OutputFormat,
    what: &str,
    value: Option<T>,
    render: impl FnOnce(&dyn OutputFormatter, &T),
) -> Result<()> {
    match value {
        Some(value) if format.is_json() => {
            let json = serde_json::to_value(&value).context("Failed to serialize response")?;
            formatter.print_json(&json);
        }
        Some(value) => {
            formatter.success(what);
            render(formatter, &value);
        }
        None if format.is_json() => {
            formatter.print_json(&serde_json::json!({"found": false, "resource": what}));
        }
        None => formatter.warn(&format!("{what}: no data available")),
    }
    Ok(())
}

// ============================================================================
// Human rendering
// ============================================================================

/// `"Alpha, Aaron vs Beta, Bruno"`, or the event id when no names are known.
pub(crate) fn matchup(event: &SportEvent) -> String {
    if event.competitors.is_empty() {
        return event.id.clone();
    }
    event
        .competitors
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(" vs ")
}

fn status_line(summary: &SportEventSummary) -> String {
    summary
        .sport_event_status
        .as_ref()
        .and_then(|s| s.match_status.clone().or_else(|| s.status.clone()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub(crate) fn render_rankings(
    formatter: &dyn OutputFormatter,
    rankings: &Rankings,
    competitor: Option<&CompetitorId>,
    limit: usize,
) {
    if let Some(id) = competitor {
        match rankings.find(id.as_str()) {
            Some((list, entry)) => formatter.field(
                &list.name,
                &format!(
                    "#{} {} ({} pts)",
                    entry.rank,
                    entry.competitor.name,
                    entry.points.unwrap_or_default()
                ),
            ),
            None => formatter.info(&format!("{id} is not ranked")),
        }
        return;
    }

    for list in &rankings.rankings {
        let week = list
            .week
            .map(|w| format!(", week {w}"))
            .unwrap_or_default();
        formatter.info(&format!("{}{}", list.name, week));
        for entry in list.competitor_rankings.iter().take(limit) {
            formatter.info(&format!(
                "  {:>3}. {:<30} {:>6} pts",
                entry.rank,
                entry.competitor.name,
                entry.points.unwrap_or_default()
            ));
        }
    }
}

fn render_schedule(formatter: &dyn OutputFormatter, schedule: &DailySchedule) {
    formatter.info(&format!("{} events", schedule.summaries.len()));
    for summary in &schedule.summaries {
        let start = summary.sport_event.start_time.as_deref().unwrap_or("--");
        formatter.info(&format!(
            "  {start}  {}  [{}]",
            matchup(&summary.sport_event),
            status_line(summary)
        ));
    }
}

fn render_summary(formatter: &dyn OutputFormatter, summary: &SportEventSummary) {
    formatter.field("Match", &matchup(&summary.sport_event));
    if let Some(start) = &summary.sport_event.start_time {
        formatter.field("Start", start);
    }
    formatter.field("Status", &status_line(summary));
    if let Some(status) = &summary.sport_event_status {
        if let (Some(home), Some(away)) = (status.home_score, status.away_score) {
            formatter.field("Score", &format!("{home}-{away}"));
        }
        if let Some(winner) = &status.winner_id {
            formatter.field("Winner", winner);
        }
    }
}

fn render_seasons(formatter: &dyn OutputFormatter, seasons: &Seasons) {
    for season in &seasons.seasons {
        let span = match (&season.start_date, &season.end_date) {
            (Some(start), Some(end)) => format!(" ({start} to {end})"),
            _ => String::new(),
        };
        formatter.info(&format!("{:<24} {}{}", season.id, season.name, span));
    }
}

pub(crate) fn render_profile(formatter: &dyn OutputFormatter, profile: &CompetitorProfile) {
    let competitor = &profile.competitor;
    formatter.field("Name", &competitor.name);
    formatter.field("ID", &competitor.id);
    if let Some(country) = &competitor.country {
        formatter.field("Country", country);
    }
    if let Some(abbreviation) = &competitor.abbreviation {
        formatter.field("Abbreviation", abbreviation);
    }
}

pub(crate) fn render_head_to_head(
    formatter: &dyn OutputFormatter,
    record: &HeadToHead,
    a: &str,
    b: &str,
) {
    formatter.field(
        "Record",
        &format!(
            "{}-{} over {} meetings",
            record.wins(a),
            record.wins(b),
            record.last_meetings.len()
        ),
    );
    for meeting in record.last_meetings.iter().take(5) {
        let date = meeting.sport_event.start_time.as_deref().unwrap_or("--");
        let winner = meeting
            .sport_event_status
            .as_ref()
            .and_then(|s| s.winner_id.as_deref())
            .unwrap_or("-");
        formatter.info(&format!("  {date}  won by {winner}"));
    }
    if let Some(next) = record.next_meetings.first() {
        formatter.field("Next", &matchup(&next.sport_event));
    }
}
