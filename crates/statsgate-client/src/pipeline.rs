//! Governed request pipeline
//!
//! [`QuotaGovernor`] composes the stages every network request goes through,
//! in order:
//!
//! 1. [`AdmissionQueue`] - fail fast when too much work is already queued
//! 2. [`ConcurrencyGate`] - wait for an execution slot
//! 3. [`RetryGovernor`] - take a token, send, resubmit on 429
//!
//! Non-idempotent requests are admitted and gated like any other but are
//! sent exactly once, without taking a token and without 429 resubmission.

use std::sync::Arc;

use statsgate_core::domain::{RateBudget, RetryBackoff};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::{
    admission::{AdmissionQueue, ConcurrencyGate},
    rate_limit::TokenBucket,
    retry::RetryGovernor,
    transport::{ApiRequest, ApiResponse, HttpTransport},
    ApiError,
};

/// Quota governance for one upstream.
pub struct QuotaGovernor {
    budget: RateBudget,
    admission: AdmissionQueue,
    gate: ConcurrencyGate,
    bucket: Arc<TokenBucket>,
    retry: RetryGovernor,
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for QuotaGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaGovernor")
            .field("budget", &self.budget)
            .field("pending", &self.pending())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl QuotaGovernor {
    pub fn new(
        budget: RateBudget,
        backoff: RetryBackoff,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let bucket = Arc::new(TokenBucket::from_budget(&budget));
        Self {
            admission: AdmissionQueue::new(budget.max_queued()),
            gate: ConcurrencyGate::new(budget.max_concurrency()),
            retry: RetryGovernor::new(Arc::clone(&bucket), budget.max_429_retries(), backoff),
            bucket,
            budget,
            transport,
        }
    }

    /// Runs `request` through admission, the concurrency gate and, for
    /// idempotent requests, the token bucket and 429 retry loop.
    ///
    /// A throttled response that outlived the retry budget is returned as
    /// `Ok`; inspect [`ApiResponse::is_throttled`].
    ///
    /// # Errors
    /// - [`ApiError::AdmissionRejected`] when the queue is full; nothing is sent
    /// - [`ApiError::Cancelled`] when `cancel` fires at any stage
    /// - [`ApiError::UnsupportedRequest`] for an idempotent method carrying a body
    /// - [`ApiError::Transport`] on connection failure
    #[instrument(skip_all, fields(method = %request.method(), endpoint = request.endpoint()))]
    pub async fn execute(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        let _admission = self.admission.enter()?;
        let _slot = self.gate.enter(cancel).await?;

        if request.is_idempotent() {
            return self.retry.execute(self.transport.as_ref(), request, cancel).await;
        }

        debug!("Non-idempotent request: single attempt, no rate limiting");
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        self.transport.send(request, cancel).await
    }

    pub fn budget(&self) -> &RateBudget {
        &self.budget
    }

    /// Requests queued or in flight.
    pub fn pending(&self) -> usize {
        self.admission.pending()
    }

    /// Requests holding an execution slot.
    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    pub fn available_tokens(&self) -> f64 {
        self.bucket.available_tokens()
    }
}
