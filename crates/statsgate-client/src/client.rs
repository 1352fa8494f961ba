//! Typed statistics client
//!
//! [`StatsClient`] exposes one method per provider operation. Each call is
//! served from the [`ResponseCache`] when possible; on a miss it travels the
//! [`QuotaGovernor`] pipeline and the terminal response is mapped to a value,
//! an absence, or an [`ApiError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use statsgate_client::StatsClient;
//! use statsgate_core::{config::Config, domain::CompetitorId};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = StatsClient::from_config(&Config::default())?;
//! let cancel = CancellationToken::new();
//!
//! let before = client.meter().snapshot();
//! let a = CompetitorId::new("sr:competitor:14882")?;
//! let b = CompetitorId::new("sr:competitor:225050")?;
//! if let Some(h2h) = client.versus(&a, &b, &cancel).await? {
//!     println!("{} meetings", h2h.last_meetings.len());
//! }
//! println!("{:?}", client.meter().delta_since(&before, 5));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use statsgate_core::{
    config::Config,
    domain::{
        CachePolicy, CompetitorId, RateBudget, RetryBackoff, ScheduleDate, SportEventId, TtlClass,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cache::{cache_key, canonical_pair, CacheStats, ResponseCache},
    meter::RequestMeter,
    models::{CompetitorProfile, DailySchedule, HeadToHead, Rankings, Seasons, SportEventSummary},
    pipeline::QuotaGovernor,
    transport::{ApiRequest, ApiResponse, HttpTransport, MeteredTransport, ReqwestTransport},
    ApiError,
};

// ============================================================================
// Operation
// ============================================================================

/// A provider read: where it goes, how it is metered and cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    path: String,
    endpoint: String,
    cache_key: String,
    ttl_class: TtlClass,
}

impl Operation {
    pub fn rankings() -> Self {
        Self {
            path: "/rankings.json".to_string(),
            endpoint: "rankings.json".to_string(),
            cache_key: cache_key("rankings.json", &[]),
            ttl_class: TtlClass::Rankings,
        }
    }

    pub fn daily_schedule(date: &ScheduleDate) -> Self {
        let date = date.to_string();
        Self {
            path: format!("/schedules/{date}/summaries.json"),
            endpoint: "schedules/{date}/summaries.json".to_string(),
            cache_key: cache_key("schedules/summaries.json", &[("date", date.as_str())]),
            ttl_class: TtlClass::Schedule,
        }
    }

    pub fn sport_event_summary(event: &SportEventId) -> Self {
        Self {
            path: format!("/sport_events/{event}/summary.json"),
            endpoint: "sport_events/{id}/summary.json".to_string(),
            cache_key: cache_key("sport_events/summary.json", &[("sport_event", event.as_str())]),
            ttl_class: TtlClass::EventSummary,
        }
    }

    pub fn seasons() -> Self {
        Self {
            path: "/seasons.json".to_string(),
            endpoint: "seasons.json".to_string(),
            cache_key: cache_key("seasons.json", &[]),
            ttl_class: TtlClass::SeasonMetadata,
        }
    }

    pub fn competitor_profile(competitor: &CompetitorId) -> Self {
        Self {
            path: format!("/competitors/{competitor}/profile.json"),
            endpoint: "competitors/{id}/profile.json".to_string(),
            cache_key: cache_key("competitors/profile.json", &[("competitor", competitor.as_str())]),
            ttl_class: TtlClass::Profile,
        }
    }

    /// Head-to-head record. Argument order does not matter: both the path
    /// and the cache key use the sorted pair.
    pub fn versus(a: &CompetitorId, b: &CompetitorId) -> Self {
        let (lo, hi) = canonical_pair(a.as_str(), b.as_str());
        Self {
            path: format!("/competitors/{lo}/versus/{hi}/summaries.json"),
            endpoint: "competitors/{id}/versus/{id}/summaries.json".to_string(),
            cache_key: cache_key(
                "competitors/versus/summaries.json",
                &[("competitor_a", lo), ("competitor_b", hi)],
            ),
            ttl_class: TtlClass::HeadToHead,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn ttl_class(&self) -> TtlClass {
        self.ttl_class
    }

    fn request(&self) -> ApiRequest {
        ApiRequest::get(self.path.clone()).with_endpoint(self.endpoint.clone())
    }
}

// ============================================================================
// StatsClient
// ============================================================================

/// Typed, cached, quota-governed client.
///
/// Shares one budget, cache and meter across all concurrent callers; wrap it
/// in an `Arc` to hand it to spawned tasks.
#[derive(Debug)]
pub struct StatsClient {
    governor: QuotaGovernor,
    cache: ResponseCache<Value>,
    policy: CachePolicy,
    meter: Arc<RequestMeter>,
}

impl StatsClient {
    /// Builds a client talking to `config.api.base_url`.
    ///
    /// # Errors
    /// Returns [`ApiError::InvalidConfig`] if the budget or backoff settings
    /// are invalid or the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        if config.api.api_key.is_none() {
            warn!("No API key configured; the upstream will likely answer 401");
        }
        let transport = ReqwestTransport::from_config(&config.api)?;
        Ok(Self::with_transport(
            transport,
            config.rate_budget()?,
            config.retry_backoff()?,
            config.cache_policy(),
            Arc::new(RequestMeter::new()),
        ))
    }

    /// Builds a client over any transport. Attempts are recorded in `meter`.
    pub fn with_transport<T: HttpTransport + 'static>(
        transport: T,
        budget: RateBudget,
        backoff: RetryBackoff,
        policy: CachePolicy,
        meter: Arc<RequestMeter>,
    ) -> Self {
        let transport: Arc<dyn HttpTransport> =
            Arc::new(MeteredTransport::new(transport, Arc::clone(&meter)));
        Self {
            governor: QuotaGovernor::new(budget, backoff, transport),
            cache: ResponseCache::new(policy.negative_ttl),
            policy,
            meter,
        }
    }

    pub async fn rankings(&self, cancel: &CancellationToken) -> Result<Option<Rankings>, ApiError> {
        self.fetch(&Operation::rankings(), cancel).await
    }

    pub async fn daily_schedule(
        &self,
        date: &ScheduleDate,
        cancel: &CancellationToken,
    ) -> Result<Option<DailySchedule>, ApiError> {
        self.fetch(&Operation::daily_schedule(date), cancel).await
    }

    pub async fn sport_event_summary(
        &self,
        event: &SportEventId,
        cancel: &CancellationToken,
    ) -> Result<Option<SportEventSummary>, ApiError> {
        self.fetch(&Operation::sport_event_summary(event), cancel)
            .await
    }

    pub async fn seasons(&self, cancel: &CancellationToken) -> Result<Option<Seasons>, ApiError> {
        self.fetch(&Operation::seasons(), cancel).await
    }

    pub async fn competitor_profile(
        &self,
        competitor: &CompetitorId,
        cancel: &CancellationToken,
    ) -> Result<Option<CompetitorProfile>, ApiError> {
        self.fetch(&Operation::competitor_profile(competitor), cancel)
            .await
    }

    /// Head-to-head record; `versus(a, b)` and `versus(b, a)` share one
    /// cache entry.
    pub async fn versus(
        &self,
        a: &CompetitorId,
        b: &CompetitorId,
        cancel: &CancellationToken,
    ) -> Result<Option<HeadToHead>, ApiError> {
        self.fetch(&Operation::versus(a, b), cancel).await
    }

    /// Runs an operation and deserializes its payload.
    ///
    /// # Errors
    /// See [`ApiError`]. Absent results (404, empty payload) are `Ok(None)`.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &Operation,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, ApiError> {
        let value = self.fetch_value(operation, cancel).await?;
        value
            .map(|v| {
                serde_json::from_value(v).map_err(|e| ApiError::InvalidResponse {
                    url: operation.path().to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    /// Runs an operation and returns the raw JSON payload.
    pub async fn fetch_value(
        &self,
        operation: &Operation,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, ApiError> {
        if !self.policy.enabled {
            return self.load(operation, cancel).await;
        }
        let ttl = self.policy.ttl_for(operation.ttl_class());
        self.cache
            .get_or_load(operation.cache_key(), ttl, cancel, || {
                self.load(operation, cancel)
            })
            .await
    }

    async fn load(
        &self,
        operation: &Operation,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, ApiError> {
        let response = self.governor.execute(&operation.request(), cancel).await?;
        interpret(response)
    }

    pub fn meter(&self) -> &Arc<RequestMeter> {
        &self.meter
    }

    pub fn governor(&self) -> &QuotaGovernor {
        &self.governor
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache_policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Drops every cached response.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// Maps a terminal response to a payload, an absence or an error.
fn interpret(response: ApiResponse) -> Result<Option<Value>, ApiError> {
    let status = response.status();

    if status.is_success() {
        if response.body().iter().all(u8::is_ascii_whitespace) {
            debug!(url = response.url(), "Empty body, treating as absent");
            return Ok(None);
        }
        let value: Value = response.json()?;
        return Ok((!is_empty_payload(&value)).then_some(value));
    }

    match status {
        StatusCode::NOT_FOUND => {
            debug!(url = response.url(), "404, treating as absent");
            Ok(None)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::AuthFailure {
            status,
            url: response.url().to_string(),
            body: response.body_excerpt(),
        }),
        StatusCode::TOO_MANY_REQUESTS => Err(ApiError::QuotaExhausted {
            url: response.url().to_string(),
            attempts: response.attempts(),
            retry_after: response.retry_after(),
            body: response.body_excerpt(),
        }),
        _ => Err(ApiError::Http {
            status,
            url: response.url().to_string(),
            body: response.body_excerpt(),
        }),
    }
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
