//! Scripted transport for unit tests.

use std::{
    collections::VecDeque,
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, RETRY_AFTER},
    StatusCode,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::{
    transport::{ApiRequest, ApiResponse, HttpTransport},
    ApiError,
};

pub(crate) fn response(status: u16, body: &str) -> ApiResponse {
    ApiResponse::new(
        StatusCode::from_u16(status).unwrap(),
        HeaderMap::new(),
        body.as_bytes().to_vec(),
        "http://scripted",
    )
}

pub(crate) fn throttled(retry_after: &str) -> ApiResponse {
    let mut headers = HeaderMap::new();
    headers.insert(RETRY_AFTER, HeaderValue::from_str(retry_after).unwrap());
    ApiResponse::new(
        StatusCode::TOO_MANY_REQUESTS,
        headers,
        b"slow down".to_vec(),
        "http://scripted",
    )
}

enum Step {
    Respond(ApiResponse),
    Fail,
}

/// Replays queued responses in order, then answers `200 {"ok":true}`.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    paths: Mutex<Vec<String>>,
    delay: Option<Duration>,
    /// When set, every send waits for a permit before answering.
    hold: Option<Arc<Semaphore>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
            delay: None,
            hold: None,
        }
    }

    pub(crate) fn with_statuses(statuses: &[u16]) -> Self {
        let transport = Self::new();
        for &status in statuses {
            if status == 429 {
                transport.push(response(429, "slow down"));
            } else {
                transport.push(response(status, r#"{"ok":true}"#));
            }
        }
        transport
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn with_hold(mut self, hold: Arc<Semaphore>) -> Self {
        self.hold = Some(hold);
        self
    }

    pub(crate) fn push(&self, response: ApiResponse) {
        self.script.lock().unwrap().push_back(Step::Respond(response));
    }

    pub(crate) fn push_error(&self) {
        self.script.lock().unwrap().push_back(Step::Fail);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    async fn answer(&self, cancel: &CancellationToken) -> Result<ApiResponse, ApiError> {
        if let Some(ref hold) = self.hold {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                permit = hold.acquire() => permit.unwrap().forget(),
            }
        }
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail) => Err(ApiError::Transport {
                url: "http://scripted".into(),
                source: Box::new(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")),
            }),
            None => Ok(response(200, r#"{"ok":true}"#)),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(request.path().to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.answer(cancel).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
