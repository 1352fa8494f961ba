//! Shared helpers for statsgate-client integration tests
//!
//! Each helper returns a client pointed at a fresh wiremock server. The
//! default test budget is generous (no pacing delays) and backs off for a
//! few milliseconds on 429 so tests run in real time.

use statsgate_client::StatsClient;
use statsgate_core::config::ConfigBuilder;
use wiremock::MockServer;

pub const API_KEY: &str = "test-api-key";

/// Builder preconfigured for the mock server.
pub fn test_config(server: &MockServer) -> ConfigBuilder {
    ConfigBuilder::new()
        .base_url(server.uri())
        .api_key(API_KEY)
        .timeout_secs(5)
        .requests_per_second(100.0)
        .burst(100)
        .max_concurrency(4)
        .max_429_retries(3)
        .queue_limit(50)
        .default_retry_after_ms(10)
        .jitter_ms(0, 5)
}

/// Starts a server and a client with the default test budget.
pub async fn setup() -> (MockServer, StatsClient) {
    let server = MockServer::start().await;
    let client = client_from(test_config(&server));
    (server, client)
}

pub fn client_from(builder: ConfigBuilder) -> StatsClient {
    StatsClient::from_config(&builder.build()).expect("failed to build client")
}

pub fn rankings_body() -> serde_json::Value {
    serde_json::json!({
        "generated_at": "2026-10-12T00:00:00+00:00",
        "rankings": [{
            "type_id": 1,
            "name": "ATP",
            "year": 2026,
            "week": 41,
            "gender": "men",
            "competitor_rankings": [
                {
                    "rank": 1,
                    "movement": 0,
                    "points": 11250,
                    "competitions_played": 19,
                    "competitor": {
                        "id": "sr:competitor:14882",
                        "name": "Alpha, Aaron",
                        "country": "Nowhere",
                        "country_code": "NOW",
                        "abbreviation": "ALP"
                    }
                },
                {
                    "rank": 2,
                    "movement": 1,
                    "points": 9800,
                    "competitor": {"id": "sr:competitor:225050", "name": "Beta, Bruno"}
                }
            ]
        }]
    })
}
