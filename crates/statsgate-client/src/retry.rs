//! 429 retry governance
//!
//! [`RetryGovernor`] drives one idempotent read through the token bucket and
//! the transport. A `429 Too Many Requests` response is resubmitted after the
//! server's `Retry-After` hint plus a random jitter, up to `max_429_retries`
//! times. Every resubmission is a fresh attempt: it takes a new token and is
//! metered like the first. Any other status ends the loop.
//!
//! Only GET and HEAD requests without a body may travel this path.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDateTime, Utc};
use statsgate_core::domain::RetryBackoff;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    rate_limit::TokenBucket,
    transport::{ApiRequest, ApiResponse, HttpTransport},
    ApiError,
};

/// Upper bound on any server-supplied `Retry-After`
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Resubmits throttled reads within a fixed budget.
#[derive(Debug)]
pub struct RetryGovernor {
    bucket: Arc<TokenBucket>,
    max_retries: u32,
    backoff: RetryBackoff,
}

impl RetryGovernor {
    pub fn new(bucket: Arc<TokenBucket>, max_retries: u32, backoff: RetryBackoff) -> Self {
        Self {
            bucket,
            max_retries,
            backoff,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> &RetryBackoff {
        &self.backoff
    }

    /// Delay before resubmitting after `response`: the `Retry-After` hint
    /// (or the default delay) plus jitter.
    pub fn backoff_delay(&self, response: &ApiResponse) -> Duration {
        let hint = response
            .retry_after_header()
            .map(|value| parse_retry_after(value, self.backoff.default_delay()))
            .unwrap_or_else(|| self.backoff.default_delay());
        hint + jitter(&self.backoff)
    }

    /// Sends `request`, resubmitting on 429 until it succeeds, fails with
    /// another status, or the retry budget is spent.
    ///
    /// When the budget is spent the final 429 response is returned as `Ok`;
    /// the caller decides how to surface it. [`ApiResponse::attempts`] tells
    /// how many attempts were made.
    ///
    /// # Errors
    /// - [`ApiError::UnsupportedRequest`] for non-idempotent methods or
    ///   requests with a body, before any attempt is made
    /// - [`ApiError::Cancelled`] if `cancel` fires while waiting for a token,
    ///   sending or backing off
    /// - [`ApiError::Transport`] on a connection-level failure (not retried)
    pub async fn execute<T: HttpTransport + ?Sized>(
        &self,
        transport: &T,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        if !request.is_idempotent() {
            return Err(ApiError::UnsupportedRequest {
                method: request.method().clone(),
                reason: "only GET and HEAD requests are resubmitted after a 429".to_string(),
            });
        }

        let mut attempt: u32 = 0;
        loop {
            let current = request.clone_for_retry()?;
            self.bucket.acquire(cancel).await?;

            let response = transport.send(&current, cancel).await?;
            let attempts = attempt + 1;

            if !response.is_throttled() {
                if attempt > 0 {
                    info!(
                        endpoint = request.endpoint(),
                        attempts,
                        status = response.status().as_u16(),
                        "Request completed after 429 retries"
                    );
                }
                return Ok(response.with_attempts(attempts));
            }

            if attempt >= self.max_retries {
                warn!(
                    endpoint = request.endpoint(),
                    attempts, "Still throttled after exhausting retry budget"
                );
                return Ok(response.with_attempts(attempts));
            }

            let delay = self.backoff_delay(&response);
            info!(
                endpoint = request.endpoint(),
                attempt = attempts,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Received 429, backing off before retry"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(endpoint = request.endpoint(), "Cancelled during 429 backoff");
                    return Err(ApiError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

/// Uniform random jitter in the backoff's range.
fn jitter(backoff: &RetryBackoff) -> Duration {
    let (min, max) = backoff.jitter_range();
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    if max_ms <= min_ms {
        return min;
    }
    Duration::from_millis(fastrand::u64(min_ms..=max_ms))
}

// ============================================================================
// Retry-After parsing
// ============================================================================

/// Parses a `Retry-After` header value, falling back to `default` when it
/// cannot be understood.
///
/// The header can be either:
/// - A number of seconds (e.g., `"30"` or `"1.5"`)
/// - An HTTP-date (e.g., `"Fri, 31 Dec 2027 23:59:59 GMT"`), relative to now
///
/// Dates in the past yield zero. Values are capped at [`MAX_RETRY_AFTER`].
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    match try_parse_retry_after(value) {
        Some(delay) => delay,
        None => {
            warn!(value, "Could not parse Retry-After header, using default");
            default
        }
    }
}

/// Like [`parse_retry_after`], but `None` when the value is unparseable.
pub fn try_parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    // Integer seconds first (most common)
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Some(Duration::from_secs_f64(seconds.min(MAX_RETRY_AFTER.as_secs_f64())));
        }
        return None;
    }

    let date = parse_http_date(value)?;
    let delay = (date - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    Some(delay.min(MAX_RETRY_AFTER))
}

/// Obsolete HTTP-date forms recipients must still accept: RFC 850 and asctime
const LEGACY_HTTP_DATE_FORMATS: &[&str] = &["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// Parses an HTTP-date in IMF-fixdate (RFC 2822), RFC 850 or asctime form.
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    LEGACY_HTTP_DATE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|naive| naive.and_utc())
    })
}
