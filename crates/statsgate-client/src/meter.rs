//! Request metering
//!
//! [`RequestMeter`] counts every network attempt made by a client: totals,
//! throttled responses, cumulative latency and a per-endpoint breakdown.
//! Counters only grow. Attribution works by taking a [`MeterSnapshot`]
//! before a unit of work and computing a [`UsageDelta`] after it.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Monotonic, process-wide attempt counters.
#[derive(Debug, Default)]
pub struct RequestMeter {
    requests: AtomicU64,
    status_429: AtomicU64,
    elapsed_ms: AtomicU64,
    per_endpoint: DashMap<String, AtomicU64>,
}

/// Point-in-time copy of the meter's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeterSnapshot {
    pub requests: u64,
    pub status_429: u64,
    pub elapsed_ms: u64,
    pub per_endpoint: BTreeMap<String, u64>,
    pub taken_at: DateTime<Utc>,
}

/// Usage between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageDelta {
    pub requests: u64,
    pub status_429: u64,
    pub elapsed_ms: u64,
    /// Mean latency per attempt; zero when no attempt was made
    pub avg_latency_ms: f64,
    /// Endpoints by attempt count, descending, ties by name
    pub top_endpoints: Vec<(String, u64)>,
}

impl RequestMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed attempt.
    pub fn track(&self, endpoint: &str, status: u16, elapsed_ms: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if status == 429 {
            self.status_429.fetch_add(1, Ordering::Relaxed);
        }
        self.elapsed_ms.fetch_add(elapsed_ms, Ordering::Relaxed);

        if let Some(counter) = self.per_endpoint.get(endpoint) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.per_endpoint
            .entry(endpoint.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the current counters.
    ///
    /// Each counter is read atomically; the set as a whole may straddle
    /// concurrent updates.
    pub fn snapshot(&self) -> MeterSnapshot {
        let per_endpoint = self
            .per_endpoint
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MeterSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            status_429: self.status_429.load(Ordering::Relaxed),
            elapsed_ms: self.elapsed_ms.load(Ordering::Relaxed),
            per_endpoint,
            taken_at: Utc::now(),
        }
    }

    /// Usage since `before`, listing at most `top_n` endpoints.
    pub fn delta_since(&self, before: &MeterSnapshot, top_n: usize) -> UsageDelta {
        self.snapshot().delta(before, top_n)
    }
}

impl MeterSnapshot {
    /// Usage between `before` and this snapshot.
    ///
    /// Subtraction saturates, so a `before` taken from a different meter
    /// never yields negative counts.
    pub fn delta(&self, before: &MeterSnapshot, top_n: usize) -> UsageDelta {
        let requests = self.requests.saturating_sub(before.requests);
        let status_429 = self.status_429.saturating_sub(before.status_429);
        let elapsed_ms = self.elapsed_ms.saturating_sub(before.elapsed_ms);

        let mut top_endpoints: Vec<(String, u64)> = self
            .per_endpoint
            .iter()
            .filter_map(|(endpoint, &after)| {
                let prior = before.per_endpoint.get(endpoint).copied().unwrap_or(0);
                let count = after.saturating_sub(prior);
                (count > 0).then(|| (endpoint.clone(), count))
            })
            .collect();
        top_endpoints.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_endpoints.truncate(top_n);

        let avg_latency_ms = if requests > 0 {
            elapsed_ms as f64 / requests as f64
        } else {
            0.0
        };

        UsageDelta {
            requests,
            status_429,
            elapsed_ms,
            avg_latency_ms,
            top_endpoints,
        }
    }
}
