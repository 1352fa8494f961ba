//! Token bucket rate limiting
//!
//! Paces every network attempt so the upstream quota is never exceeded.
//! The bucket holds up to `burst` tokens and refills continuously at
//! `requests_per_second`. Each attempt, including every 429 resubmission,
//! consumes exactly one token.
//!
//! In any one-second window at most `burst + requests_per_second` attempts
//! are admitted.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use statsgate_client::rate_limit::TokenBucket;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), statsgate_client::ApiError> {
//! let bucket = TokenBucket::new(2, 2.0);
//! let cancel = CancellationToken::new();
//! bucket.acquire(&cancel).await?;
//! // ... make API call ...
//! # Ok(())
//! # }
//! ```

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use statsgate_core::domain::RateBudget;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ApiError;

/// Shortest sleep between two acquisition attempts
pub const MIN_WAIT: Duration = Duration::from_millis(5);

/// Longest single sleep; the loop re-evaluates afterwards
const MAX_WAIT: Duration = Duration::from_secs(60);

/// Mutable bucket state, protected by a Mutex.
#[derive(Debug)]
struct TokenBucketInner {
    /// Current number of available tokens (fractional for smooth refill)
    tokens: f64,
    /// Timestamp of the last refill calculation
    last_refill: Instant,
}

/// Token bucket shared by every request of one client.
///
/// Refill and consumption happen under a single lock acquisition, so
/// concurrent callers can never both take the last token.
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum number of tokens in the bucket
    capacity: u32,
    /// Tokens added per second
    refill_rate: f64,
    inner: Mutex<TokenBucketInner>,
}

impl TokenBucket {
    /// Creates a new `TokenBucket`. The bucket starts full.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of tokens (the burst)
    /// * `refill_rate` - Tokens added per second
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            inner: Mutex::new(TokenBucketInner {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Creates a bucket sized by a [`RateBudget`].
    pub fn from_budget(budget: &RateBudget) -> Self {
        Self::new(budget.burst_capacity(), budget.requests_per_second())
    }

    fn lock(&self) -> MutexGuard<'_, TokenBucketInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds the tokens earned since the last refill, capped at capacity.
    fn refill(inner: &mut TokenBucketInner, refill_rate: f64, capacity: u32) {
        let now = Instant::now();
        let elapsed_secs = now.saturating_duration_since(inner.last_refill).as_secs_f64();

        if elapsed_secs > 0.0 {
            let new_tokens = elapsed_secs * refill_rate;
            inner.tokens = (inner.tokens + new_tokens).min(capacity as f64);
            inner.last_refill = now;
        }
    }

    fn deficit_wait(&self, tokens: f64) -> Duration {
        if tokens >= 1.0 {
            return Duration::ZERO;
        }
        if self.refill_rate > 0.0 {
            // Clamp before converting; tiny rates overflow `Duration`.
            let secs = (1.0 - tokens) / self.refill_rate;
            Duration::from_secs_f64(secs.min(MAX_WAIT.as_secs_f64()))
        } else {
            MAX_WAIT
        }
    }

    /// Takes one token, or reports how long until one is available.
    fn take_or_wait(&self) -> Result<(), Duration> {
        let mut inner = self.lock();
        Self::refill(&mut inner, self.refill_rate, self.capacity);

        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            Ok(())
        } else {
            Err(self.deficit_wait(inner.tokens))
        }
    }

    /// Attempts to take a single token without waiting.
    pub fn try_acquire(&self) -> bool {
        self.take_or_wait().is_ok()
    }

    /// Waits until a token is available and takes it.
    ///
    /// Cancellation is observed before every attempt and during every wait.
    /// A cancelled caller never consumes a token.
    ///
    /// # Errors
    /// Returns [`ApiError::Cancelled`] if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), ApiError> {
        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let wait = match self.take_or_wait() {
                Ok(()) => return Ok(()),
                Err(wait) => wait.max(MIN_WAIT),
            };

            debug!(
                wait_ms = wait.as_millis() as u64,
                "No tokens available, waiting for refill"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Estimated wait until a token becomes available. Zero when one is ready.
    pub fn time_until_available(&self) -> Duration {
        let mut inner = self.lock();
        Self::refill(&mut inner, self.refill_rate, self.capacity);
        self.deficit_wait(inner.tokens)
    }

    /// Current number of available tokens (after refill).
    pub fn available_tokens(&self) -> f64 {
        let mut inner = self.lock();
        Self::refill(&mut inner, self.refill_rate, self.capacity);
        inner.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}
