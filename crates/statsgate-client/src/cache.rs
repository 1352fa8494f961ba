//! Response cache
//!
//! A TTL cache in front of the governed pipeline. Keys are derived from the
//! endpoint path and its normalized parameters (see [`cache_key`]). Absent
//! results (404, empty payload) are cached too, under a short corrective TTL,
//! so a missing entity is not re-fetched on every call. Errors are never
//! cached.
//!
//! Concurrent misses for the same key each load independently; the last
//! writer wins.

use std::{
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::ApiError;

/// Longest TTL honoured; larger values are clamped
const MAX_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    /// `None` records a known-absent result
    value: Option<V>,
    expires_at: Instant,
}

/// Hit/miss counters and current size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// TTL cache of optional values.
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    negative_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync> ResponseCache<V> {
    /// Creates an empty cache; absent results live for `negative_ttl`.
    pub fn new(negative_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            negative_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Live entry for `key`. The outer `None` is a miss; `Some(None)` is a
    /// cached absence. Expired entries are evicted on the way.
    pub fn get(&self, key: &str) -> Option<Option<V>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        None
    }

    /// Stores `value` for `ttl`, or for the negative TTL when it is absent.
    pub fn insert(&self, key: impl Into<String>, value: Option<V>, ttl: Duration) {
        let ttl = if value.is_none() {
            self.negative_ttl.min(ttl)
        } else {
            ttl
        };
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl.min(MAX_TTL))
            .unwrap_or(now + Duration::from_secs(60));
        self.entries
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Serves `key` from cache, or runs `loader` and caches its result.
    ///
    /// # Errors
    /// - [`ApiError::Cancelled`] if `cancel` has fired before loading
    /// - Any error returned by `loader`, which is not cached
    pub async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        cancel: &CancellationToken,
        loader: F,
    ) -> Result<Option<V>, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, ApiError>>,
    {
        if let Some(cached) = self.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key, absent = cached.is_none(), "Cache hit");
            return Ok(cached);
        }

        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let loaded = loader().await?;
        if loaded.is_none() {
            debug!(
                key,
                ttl_secs = self.negative_ttl.min(ttl).as_secs(),
                "Caching absent result"
            );
        }
        self.insert(key, loaded.clone(), ttl);
        Ok(loaded)
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drops every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Cache key for an endpoint and its parameters.
///
/// Parameters are sorted by name, so their order never produces distinct keys.
pub fn cache_key(endpoint: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return endpoint.to_string();
    }
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort();
    let query: Vec<String> = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{endpoint}?{}", query.join("&"))
}

/// Orders two identifiers so that symmetric lookups share one key.
pub fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
