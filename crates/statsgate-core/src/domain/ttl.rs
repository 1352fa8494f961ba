//! Cache TTL classes
//!
//! Each typed operation belongs to a [`TtlClass`] that reflects how quickly
//! its upstream data changes. [`CachePolicy`] maps classes to durations and
//! carries the short corrective TTL used for absent results.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Volatility class of a cached response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
    /// Daily schedules: change throughout the day
    Schedule,
    /// Match/event summaries
    EventSummary,
    /// Rankings: refreshed weekly upstream, polled hourly
    Rankings,
    /// Competitor profiles
    Profile,
    /// Head-to-head records
    HeadToHead,
    /// Season metadata: effectively static
    SeasonMetadata,
}

impl TtlClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtlClass::Schedule => "schedule",
            TtlClass::EventSummary => "event_summary",
            TtlClass::Rankings => "rankings",
            TtlClass::Profile => "profile",
            TtlClass::HeadToHead => "head_to_head",
            TtlClass::SeasonMetadata => "season_metadata",
        }
    }
}

/// Per-class cache lifetimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// When `false`, every call goes to the network
    pub enabled: bool,
    /// Lifetime of an absent/empty result
    pub negative_ttl: Duration,
    pub schedule: Duration,
    pub event_summary: Duration,
    pub rankings: Duration,
    pub profile: Duration,
    pub head_to_head: Duration,
    pub season_metadata: Duration,
}

impl CachePolicy {
    /// Nominal TTL for a class.
    pub fn ttl_for(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Schedule => self.schedule,
            TtlClass::EventSummary => self.event_summary,
            TtlClass::Rankings => self.rankings,
            TtlClass::Profile => self.profile,
            TtlClass::HeadToHead => self.head_to_head,
            TtlClass::SeasonMetadata => self.season_metadata,
        }
    }

    /// A policy that never serves from cache.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            negative_ttl: Duration::from_secs(120),
            schedule: Duration::from_secs(5 * 60),
            event_summary: Duration::from_secs(15 * 60),
            rankings: Duration::from_secs(60 * 60),
            profile: Duration::from_secs(6 * 60 * 60),
            head_to_head: Duration::from_secs(6 * 60 * 60),
            season_metadata: Duration::from_secs(24 * 60 * 60),
        }
    }
}
