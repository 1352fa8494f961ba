//! statsgate client - quota-governed access to a rate-limited statistics API
//!
//! Every logical read goes through the same pipeline:
//!
//! ```text
//! StatsClient ──→ ResponseCache ──(miss)──→ AdmissionQueue ──→ ConcurrencyGate
//!                                                                   │
//!          RequestMeter ←── MeteredTransport ←── TokenBucket ←── RetryGovernor
//! ```
//!
//! ## Modules
//!
//! - [`rate_limit`] - Token bucket enforcing the steady-state rate and burst
//! - [`admission`] - Fail-fast admission queue and concurrency gate
//! - [`retry`] - 429 handling: `Retry-After` parsing, jittered backoff, resubmission
//! - [`transport`] - Request/response types and the HTTP transport seam
//! - [`meter`] - Process-wide request counters with snapshot/delta attribution
//! - [`cache`] - TTL response cache with negative caching
//! - [`pipeline`] - [`QuotaGovernor`](pipeline::QuotaGovernor), the composed pipeline
//! - [`client`] - [`StatsClient`](client::StatsClient), the typed operations
//! - [`models`] - Response shapes

pub mod admission;
pub mod cache;
pub mod client;
pub mod meter;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod retry;
pub mod transport;

#[cfg(test)]
mod testing;

use std::time::Duration;

use reqwest::{Method, StatusCode};
use statsgate_core::domain::DomainError;
use thiserror::Error;

pub use client::StatsClient;
pub use meter::{MeterSnapshot, RequestMeter, UsageDelta};
pub use pipeline::QuotaGovernor;
pub use transport::{ApiRequest, ApiResponse, HttpTransport};

/// Errors surfaced by the governed client
#[derive(Debug, Error)]
pub enum ApiError {
    /// Too many requests already queued or in flight; nothing was sent
    #[error("Admission rejected: queue limit of {limit} requests reached")]
    AdmissionRejected {
        /// Configured queue limit
        limit: usize,
    },

    /// The upstream rejected the credentials (401) or the entitlement (403)
    #[error("Authentication failed with {status} for {url}: {body}")]
    AuthFailure {
        status: StatusCode,
        url: String,
        /// Response body excerpt for diagnostics
        body: String,
    },

    /// Still throttled (429) after the retry budget was spent
    #[error("Quota exhausted for {url} after {attempts} attempts")]
    QuotaExhausted {
        url: String,
        /// Network attempts made, including the first
        attempts: u32,
        /// The server's last `Retry-After` hint, if any
        retry_after: Option<Duration>,
        body: String,
    },

    /// Any other terminal non-2xx response
    #[error("HTTP {status} for {url}: {body}")]
    Http {
        status: StatusCode,
        url: String,
        body: String,
    },

    /// Connection, TLS or timeout failure. Not retried.
    #[error("Transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The request cannot travel the retry path (non-idempotent or carries a body)
    #[error("Unsupported {method} request: {reason}")]
    UnsupportedRequest { method: Method, reason: String },

    /// The response body could not be parsed into the expected shape
    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    /// The client could not be built from the supplied configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The caller's cancellation token fired
    #[error("Request cancelled")]
    Cancelled,
}

impl ApiError {
    /// HTTP status for errors that carry one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::AuthFailure { status, .. } | ApiError::Http { status, .. } => Some(*status),
            ApiError::QuotaExhausted { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
            _ => None,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::AuthFailure { .. })
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::InvalidConfig(err.to_string())
    }
}
