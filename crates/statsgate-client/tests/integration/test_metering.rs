//! Request metering and usage attribution

use statsgate_client::ApiError;
use statsgate_core::domain::CompetitorId;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_delta_counts_successes_and_throttles() {
    let server = wiremock::MockServer::start().await;
    let client = common::client_from(
        common::test_config(&server)
            .cache_enabled(false)
            .max_429_retries(0),
    );
    Mock::given(method("GET"))
        .and(path("/rankings.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::rankings_body()))
        .up_to_n_times(5)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rankings.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .mount(&server)
        .await;
    let cancel = CancellationToken::new();

    let before = client.meter().snapshot();
    for _ in 0..5 {
        assert!(client.rankings(&cancel).await.unwrap().is_some());
    }
    for _ in 0..2 {
        let err = client.rankings(&cancel).await.unwrap_err();
        assert!(matches!(err, ApiError::QuotaExhausted { attempts: 1, .. }));
    }

    let delta = client.meter().delta_since(&before, 5);
    assert_eq!(delta.requests, 7);
    assert_eq!(delta.status_429, 2);
    assert_eq!(delta.top_endpoints[0], ("rankings.json".to_string(), 7));
}

#[tokio::test]
async fn test_endpoints_are_labelled_by_template() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/competitors/[^/]+/profile\.json$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"competitor": {"id": "x"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/seasons.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "seasons": [{"id": "sr:season:1"}]
        })))
        .mount(&server)
        .await;
    let cancel = CancellationToken::new();

    let before = client.meter().snapshot();
    for i in 0..3 {
        let id = CompetitorId::new(format!("sr:competitor:{i}")).unwrap();
        client.competitor_profile(&id, &cancel).await.unwrap();
    }
    client.seasons(&cancel).await.unwrap();

    let delta = client.meter().delta_since(&before, 5);
    assert_eq!(delta.requests, 4);
    assert_eq!(
        delta.top_endpoints,
        vec![
            ("competitors/{id}/profile.json".to_string(), 3),
            ("seasons.json".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn test_cache_hits_are_not_metered() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/seasons.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "seasons": [{"id": "sr:season:1"}]
        })))
        .mount(&server)
        .await;
    let cancel = CancellationToken::new();

    client.seasons(&cancel).await.unwrap();
    let before = client.meter().snapshot();
    client.seasons(&cancel).await.unwrap();
    client.seasons(&cancel).await.unwrap();

    let delta = client.meter().delta_since(&before, 5);
    assert_eq!(delta.requests, 0);
    assert!(delta.top_endpoints.is_empty());
    assert_eq!(delta.avg_latency_ms, 0.0);
}

#[tokio::test]
async fn test_transport_failures_are_not_metered() {
    // Nothing listens on the discard port.
    let config = statsgate_core::config::ConfigBuilder::new()
        .base_url("http://127.0.0.1:9")
        .api_key(common::API_KEY)
        .timeout_secs(2)
        .build();
    let client = statsgate_client::StatsClient::from_config(&config).unwrap();

    let err = client
        .rankings(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Transport { .. }));
    assert_eq!(client.meter().snapshot().requests, 0);
}
