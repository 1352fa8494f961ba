//! Request budgets
//!
//! [`RateBudget`] fixes how much load the client may put on the upstream
//! quota: steady-state rate, burst, concurrency, queue depth and how many
//! times a throttled read is resubmitted. [`RetryBackoff`] fixes how long a
//! throttled read waits before it is resubmitted.
//!
//! Both are immutable once constructed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Default steady-state request rate (requests per second)
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 2.0;
/// Default token bucket capacity
pub const DEFAULT_BURST: u32 = 2;
/// Default number of simultaneous in-flight requests
pub const DEFAULT_MAX_CONCURRENCY: usize = 2;
/// Default number of resubmissions after a 429
pub const DEFAULT_MAX_429_RETRIES: u32 = 3;
/// Default cap on queued plus in-flight requests
pub const DEFAULT_QUEUE_LIMIT: usize = 200;

/// Immutable request budget for one upstream quota.
///
/// Deserialization goes through [`RateBudget::new`], so a decoded budget is
/// validated like a constructed one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RateBudgetFields")]
pub struct RateBudget {
    requests_per_second: f64,
    burst_capacity: u32,
    max_concurrency: usize,
    max_queued: usize,
    max_429_retries: u32,
}

impl RateBudget {
    /// Creates a validated budget.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidBudget`] if the rate is not a positive
    /// finite number, or if burst, concurrency or queue limit is zero.
    pub fn new(
        requests_per_second: f64,
        burst_capacity: u32,
        max_concurrency: usize,
        max_queued: usize,
        max_429_retries: u32,
    ) -> Result<Self, DomainError> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(DomainError::InvalidBudget(format!(
                "requests_per_second must be positive, got {requests_per_second}"
            )));
        }
        if burst_capacity == 0 {
            return Err(DomainError::InvalidBudget(
                "burst must be at least 1".to_string(),
            ));
        }
        if max_concurrency == 0 {
            return Err(DomainError::InvalidBudget(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if max_queued == 0 {
            return Err(DomainError::InvalidBudget(
                "queue_limit must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            requests_per_second,
            burst_capacity,
            max_concurrency,
            max_queued,
            max_429_retries,
        })
    }

    pub fn requests_per_second(&self) -> f64 {
        self.requests_per_second
    }

    pub fn burst_capacity(&self) -> u32 {
        self.burst_capacity
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn max_queued(&self) -> usize {
        self.max_queued
    }

    pub fn max_429_retries(&self) -> u32 {
        self.max_429_retries
    }

    /// Upper bound on requests admitted in any one-second window.
    pub fn window_ceiling(&self) -> f64 {
        self.burst_capacity as f64 + self.requests_per_second
    }
}

impl Default for RateBudget {
    /// Trial-tier defaults: 2 req/s, burst 2, 2 in flight, 200 queued, 3 retries.
    fn default() -> Self {
        Self {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst_capacity: DEFAULT_BURST,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_queued: DEFAULT_QUEUE_LIMIT,
            max_429_retries: DEFAULT_MAX_429_RETRIES,
        }
    }
}

/// Backoff applied before resubmitting a throttled read.
///
/// The delay is the server's `Retry-After` hint (or `default_delay` when the
/// header is missing or unparseable) plus a uniformly random jitter drawn
/// from `jitter_min..=jitter_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RetryBackoffFields")]
pub struct RetryBackoff {
    default_delay: Duration,
    jitter_min: Duration,
    jitter_max: Duration,
}

impl RetryBackoff {
    /// Creates a validated backoff.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidBackoff`] if `jitter_min > jitter_max`.
    pub fn new(
        default_delay: Duration,
        jitter_min: Duration,
        jitter_max: Duration,
    ) -> Result<Self, DomainError> {
        if jitter_min > jitter_max {
            return Err(DomainError::InvalidBackoff(format!(
                "jitter_min ({}ms) exceeds jitter_max ({}ms)",
                jitter_min.as_millis(),
                jitter_max.as_millis()
            )));
        }
        Ok(Self {
            default_delay,
            jitter_min,
            jitter_max,
        })
    }

    /// Backoff without jitter, mostly useful in tests.
    pub fn fixed(default_delay: Duration) -> Self {
        Self {
            default_delay,
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
        }
    }

    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }

    pub fn jitter_range(&self) -> (Duration, Duration) {
        (self.jitter_min, self.jitter_max)
    }
}

impl Default for RetryBackoff {
    /// 2s default delay with 100-400ms jitter.
    fn default() -> Self {
        Self {
            default_delay: Duration::from_secs(2),
            jitter_min: Duration::from_millis(100),
            jitter_max: Duration::from_millis(400),
        }
    }
}

/// Unvalidated wire form of [`RateBudget`]
#[derive(Deserialize)]
struct RateBudgetFields {
    requests_per_second: f64,
    burst_capacity: u32,
    max_concurrency: usize,
    max_queued: usize,
    max_429_retries: u32,
}

impl TryFrom<RateBudgetFields> for RateBudget {
    type Error = DomainError;

    fn try_from(f: RateBudgetFields) -> Result<Self, Self::Error> {
        Self::new(
            f.requests_per_second,
            f.burst_capacity,
            f.max_concurrency,
            f.max_queued,
            f.max_429_retries,
        )
    }
}

/// Unvalidated wire form of [`RetryBackoff`]
#[derive(Deserialize)]
struct RetryBackoffFields {
    default_delay: Duration,
    jitter_min: Duration,
    jitter_max: Duration,
}

impl TryFrom<RetryBackoffFields> for RetryBackoff {
    type Error = DomainError;

    fn try_from(f: RetryBackoffFields) -> Result<Self, Self::Error> {
        Self::new(f.default_delay, f.jitter_min, f.jitter_max)
    }
}
