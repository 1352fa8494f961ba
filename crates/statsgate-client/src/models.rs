//! Response shapes
//!
//! Thin views over the provider's JSON. Every field is optional or
//! defaulted and unknown fields are ignored, so additive upstream changes
//! never break deserialization.

use serde::{Deserialize, Serialize};

/// Competitor reference, as embedded in most payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorRef {
    pub id: String,
    pub name: String,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub abbreviation: Option<String>,
}

// ============================================================================
// Rankings
// ============================================================================

/// `rankings.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rankings {
    pub generated_at: Option<String>,
    pub rankings: Vec<RankingList>,
}

/// One ranking table (e.g. singles for one tour).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingList {
    pub type_id: Option<u32>,
    pub name: String,
    pub year: Option<u32>,
    pub week: Option<u32>,
    pub gender: Option<String>,
    pub competitor_rankings: Vec<CompetitorRanking>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorRanking {
    pub rank: u32,
    pub movement: Option<i32>,
    pub points: Option<u32>,
    pub competitions_played: Option<u32>,
    pub competitor: CompetitorRef,
}

impl Rankings {
    /// Looks a competitor up across all tables.
    pub fn find(&self, competitor_id: &str) -> Option<(&RankingList, &CompetitorRanking)> {
        self.rankings.iter().find_map(|list| {
            list.competitor_rankings
                .iter()
                .find(|entry| entry.competitor.id == competitor_id)
                .map(|entry| (list, entry))
        })
    }
}

// ============================================================================
// Events and schedules
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SportEvent {
    pub id: String,
    pub start_time: Option<String>,
    pub competitors: Vec<CompetitorRef>,
    /// Competition/season/round context, kept verbatim
    pub sport_event_context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SportEventStatus {
    pub status: Option<String>,
    pub match_status: Option<String>,
    pub winner_id: Option<String>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
}

/// `sport_events/{id}/summary.json`, also the element type of schedules
/// and head-to-head meetings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SportEventSummary {
    pub sport_event: SportEvent,
    pub sport_event_status: Option<SportEventStatus>,
    /// Per-competitor statistics, kept verbatim
    pub statistics: Option<serde_json::Value>,
}

/// `schedules/{date}/summaries.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailySchedule {
    pub generated_at: Option<String>,
    pub summaries: Vec<SportEventSummary>,
}

// ============================================================================
// Seasons
// ============================================================================

/// `seasons.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seasons {
    pub seasons: Vec<Season>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Season {
    pub id: String,
    pub name: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub year: Option<String>,
    pub competition_id: Option<String>,
}

// ============================================================================
// Competitors
// ============================================================================

/// `competitors/{id}/profile.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorProfile {
    pub competitor: CompetitorRef,
    pub info: Option<serde_json::Value>,
    pub competitor_rankings: Vec<serde_json::Value>,
    /// Per-season statistics, kept verbatim
    pub periods: Vec<serde_json::Value>,
}

/// `competitors/{a}/versus/{b}/summaries.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadToHead {
    pub competitors: Vec<CompetitorRef>,
    pub last_meetings: Vec<SportEventSummary>,
    pub next_meetings: Vec<SportEventSummary>,
}

impl HeadToHead {
    /// Wins per competitor id over `last_meetings`.
    pub fn wins(&self, competitor_id: &str) -> usize {
        self.last_meetings
            .iter()
            .filter(|m| {
                m.sport_event_status
                    .as_ref()
                    .and_then(|s| s.winner_id.as_deref())
                    == Some(competitor_id)
            })
            .count()
    }
}
