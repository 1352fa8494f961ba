//! 429 handling, authentication failures and admission control

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use statsgate_client::ApiError;
use statsgate_core::domain::CompetitorId;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_throttled_twice_then_success() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/rankings.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rankings.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::rankings_body()))
        .expect(1)
        .mount(&server)
        .await;

    let rankings = client.rankings(&CancellationToken::new()).await.unwrap();
    assert!(rankings.is_some());

    let snap = client.meter().snapshot();
    assert_eq!(snap.requests, 3);
    assert_eq!(snap.status_429, 2);
}

#[tokio::test]
async fn test_persistent_throttle_exhausts_retry_budget() {
    let server = wiremock::MockServer::start().await;
    let client = common::client_from(common::test_config(&server).max_429_retries(1));
    Mock::given(method("GET"))
        .and(path("/seasons.json"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "0")
                .set_body_string("quota exceeded"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let err = client.seasons(&CancellationToken::new()).await.unwrap_err();
    match err {
        ApiError::QuotaExhausted {
            attempts,
            retry_after,
            body,
            ..
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(retry_after, Some(Duration::ZERO));
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("expected QuotaExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_retry_after_is_honoured() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/seasons.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/seasons.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "seasons": [{"id": "sr:season:1", "name": "Open 2026"}]
        })))
        .mount(&server)
        .await;

    let start = Instant::now();
    let seasons = client.seasons(&CancellationToken::new()).await.unwrap();
    assert!(seasons.is_some());
    assert!(
        start.elapsed() >= Duration::from_secs(1),
        "retried after {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_auth_failures_are_not_retried() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/rankings.json"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Developer Inactive"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .rankings(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_auth_failure());
    assert!(err.to_string().contains("Developer Inactive"));
}

#[tokio::test]
async fn test_server_error_surfaces_as_http() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/seasons.json"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.seasons(&CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(502));
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let server = wiremock::MockServer::start().await;
    let client = Arc::new(common::client_from(
        common::test_config(&server).max_concurrency(2),
    ));
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"competitor": {"id": "x"}}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(6)
        .mount(&server)
        .await;
    let cancel = CancellationToken::new();

    let start = Instant::now();
    let mut tasks = JoinSet::new();
    for i in 1..=6 {
        let client = Arc::clone(&client);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let id = CompetitorId::new(format!("sr:competitor:{i}")).unwrap();
            client.competitor_profile(&id, &cancel).await
        });
    }
    while let Some(result) = tasks.join_next().await {
        assert!(result.unwrap().unwrap().is_some());
    }

    // Six 100ms calls, two at a time: at least three rounds.
    assert!(
        start.elapsed() >= Duration::from_millis(300),
        "finished in {:?}",
        start.elapsed()
    );
    assert_eq!(client.governor().in_flight(), 0);
}

#[tokio::test]
async fn test_queue_overflow_rejects_without_network() {
    let server = wiremock::MockServer::start().await;
    let client = common::client_from(
        common::test_config(&server)
            .max_concurrency(2)
            .queue_limit(2),
    );
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"competitor": {"id": "x"}}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(2)
        .mount(&server)
        .await;
    let cancel = CancellationToken::new();
    let a = CompetitorId::new("sr:competitor:1").unwrap();
    let b = CompetitorId::new("sr:competitor:2").unwrap();
    let c = CompetitorId::new("sr:competitor:3").unwrap();

    let (ra, rb, rc) = tokio::join!(
        client.competitor_profile(&a, &cancel),
        client.competitor_profile(&b, &cancel),
        client.competitor_profile(&c, &cancel),
    );

    assert!(ra.is_ok());
    assert!(rb.is_ok());
    assert!(matches!(rc, Err(ApiError::AdmissionRejected { limit: 2 })));
    assert_eq!(client.meter().snapshot().requests, 2);
}

#[tokio::test]
async fn test_cancellation_aborts_backoff() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/rankings.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .expect(1)
        .mount(&server)
        .await;
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        })
    };

    let start = Instant::now();
    let result = client.rankings(&cancel).await;
    canceller.await.unwrap();

    assert!(matches!(result, Err(ApiError::Cancelled)));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(client.meter().snapshot().requests, 1);
}
