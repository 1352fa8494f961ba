//! HTTP transport seam
//!
//! [`ApiRequest`] and [`ApiResponse`] are the owned request/response values
//! that travel through the pipeline. [`HttpTransport`] is the single network
//! seam: [`ReqwestTransport`] talks to the real upstream and
//! [`MeteredTransport`] wraps any transport so that every completed attempt
//! is recorded in the [`RequestMeter`].

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, RETRY_AFTER},
    Client, Method, RequestBuilder, StatusCode,
};
use serde::de::DeserializeOwned;
use statsgate_core::config::ApiConfig;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{meter::RequestMeter, retry::try_parse_retry_after, ApiError};

/// Maximum number of body characters carried in error values
pub const BODY_EXCERPT_LEN: usize = 512;

/// Header carrying the trial-tier API key
pub const API_KEY_HEADER: &str = "x-api-key";

// ============================================================================
// ApiRequest
// ============================================================================

/// An outbound request, relative to the transport's base URL.
#[derive(Debug)]
pub struct ApiRequest {
    method: Method,
    path: String,
    /// Metering label; defaults to the path without its leading slash
    endpoint: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let endpoint = path.trim_start_matches('/').to_string();
        Self {
            method,
            path,
            endpoint,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    /// Overrides the label the meter attributes this request to.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// GET and HEAD are the only methods resubmitted after a 429.
    pub fn is_idempotent(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Builds a fresh copy of this request for the next attempt.
    ///
    /// # Errors
    /// Returns [`ApiError::UnsupportedRequest`] when the request carries a
    /// body, since a consumed body cannot be replayed.
    pub fn clone_for_retry(&self) -> Result<Self, ApiError> {
        if self.has_body() {
            return Err(ApiError::UnsupportedRequest {
                method: self.method.clone(),
                reason: "request bodies cannot be resubmitted".to_string(),
            });
        }
        Ok(Self {
            method: self.method.clone(),
            path: self.path.clone(),
            endpoint: self.endpoint.clone(),
            query: self.query.clone(),
            headers: self.headers.clone(),
            body: None,
        })
    }
}

// ============================================================================
// ApiResponse
// ============================================================================

/// A fully read response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    url: String,
    /// Network attempts it took to obtain this response
    attempts: u32,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>, url: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body,
            url: url.into(),
            attempts: 1,
        }
    }

    pub(crate) fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_throttled(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Raw `Retry-After` header value, if present and valid UTF-8.
    pub fn retry_after_header(&self) -> Option<&str> {
        self.headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok())
    }

    /// Parsed `Retry-After` hint, if present and parseable.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_header().and_then(try_parse_retry_after)
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// At most [`BODY_EXCERPT_LEN`] characters of the body, for diagnostics.
    pub fn body_excerpt(&self) -> String {
        let text = self.text();
        match text.char_indices().nth(BODY_EXCERPT_LEN) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text,
        }
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::InvalidResponse {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }
}

// ============================================================================
// HttpTransport
// ============================================================================

/// Sends one network attempt.
///
/// Implementations perform exactly one exchange per call: no pacing, no
/// retries. Any HTTP status is a successful exchange; only connection-level
/// failures are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        (**self).send(request, cancel).await
    }
}

// ============================================================================
// ReqwestTransport
// ============================================================================

/// Transport backed by a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ReqwestTransport {
    /// Creates a transport for the given base URL.
    ///
    /// # Arguments
    /// * `base_url` - URL every request path is appended to
    /// * `api_key` - Sent as the `x-api-key` header when present
    /// * `timeout` - Per-attempt timeout
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins the base URL and a request path.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn build(&self, request: &ApiRequest, url: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(request.method().clone(), url)
            .headers(request.headers().clone())
            .header(ACCEPT, "application/json");

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(ref key) = self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }
        builder
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(request.path());
        let builder = self.build(request, &url);
        trace!(method = %request.method(), url = %url, "Sending request");

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let final_url = response.url().to_string();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(ApiResponse::new(status, headers, body.to_vec(), final_url))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = exchange => result.map_err(|e| ApiError::Transport {
                url,
                source: Box::new(e),
            }),
        }
    }
}

// ============================================================================
// MeteredTransport
// ============================================================================

/// Records every completed attempt of the inner transport.
///
/// Attempts that end without a status (connection failure, cancellation)
/// are not recorded.
#[derive(Debug)]
pub struct MeteredTransport<T> {
    inner: T,
    meter: Arc<RequestMeter>,
}

impl<T> MeteredTransport<T> {
    pub fn new(inner: T, meter: Arc<RequestMeter>) -> Self {
        Self { inner, meter }
    }

    pub fn meter(&self) -> &Arc<RequestMeter> {
        &self.meter
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for MeteredTransport<T> {
    async fn send(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        let started = Instant::now();
        let result = self.inner.send(request, cancel).await;

        if let Ok(ref response) = result {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            self.meter
                .track(request.endpoint(), response.status().as_u16(), elapsed_ms);
            debug!(
                endpoint = request.endpoint(),
                status = response.status().as_u16(),
                elapsed_ms,
                "Attempt completed"
            );
        }
        result
    }
}
