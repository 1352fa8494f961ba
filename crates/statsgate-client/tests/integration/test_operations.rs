//! Typed operations against a mocked statistics API

use statsgate_core::domain::{CompetitorId, ScheduleDate, SportEventId};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_rankings_parses_and_sends_api_key() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/rankings.json"))
        .and(header("x-api-key", common::API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::rankings_body()))
        .expect(1)
        .mount(&server)
        .await;

    let rankings = client
        .rankings(&CancellationToken::new())
        .await
        .expect("rankings failed")
        .expect("rankings absent");

    let list = &rankings.rankings[0];
    assert_eq!(list.name, "ATP");
    assert_eq!(list.competitor_rankings.len(), 2);
    let (_, leader) = rankings.find("sr:competitor:14882").unwrap();
    assert_eq!(leader.rank, 1);
    assert_eq!(leader.points, Some(11250));
}

#[tokio::test]
async fn test_repeat_calls_are_served_from_cache() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/rankings.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::rankings_body()))
        .expect(1)
        .mount(&server)
        .await;
    let cancel = CancellationToken::new();

    for _ in 0..5 {
        assert!(client.rankings(&cancel).await.unwrap().is_some());
    }

    let stats = client.cache_stats();
    assert_eq!(stats.hits, 4);
    assert_eq!(stats.misses, 1);
    assert_eq!(client.meter().snapshot().requests, 1);
}

#[tokio::test]
async fn test_daily_schedule_uses_iso_date_path() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/schedules/2026-10-17/summaries.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "summaries": [{
                "sport_event": {
                    "id": "sr:sport_event:1001",
                    "start_time": "2026-10-17T10:00:00+00:00",
                    "competitors": [
                        {"id": "sr:competitor:14882", "name": "Alpha, Aaron"},
                        {"id": "sr:competitor:225050", "name": "Beta, Bruno"}
                    ]
                },
                "sport_event_status": {"status": "not_started"}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let date: ScheduleDate = "2026-10-17".parse().unwrap();
    let schedule = client
        .daily_schedule(&date, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(schedule.summaries.len(), 1);
    let event = &schedule.summaries[0].sport_event;
    assert_eq!(event.id, "sr:sport_event:1001");
    assert_eq!(event.competitors.len(), 2);
}

#[tokio::test]
async fn test_sport_event_summary_and_seasons() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/sport_events/sr:sport_event:1001/summary.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sport_event": {"id": "sr:sport_event:1001"},
            "sport_event_status": {"status": "closed", "winner_id": "sr:competitor:14882"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/seasons.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "seasons": [
                {"id": "sr:season:1", "name": "Open 2026", "year": "2026"},
                {"id": "sr:season:2", "name": "Masters 2026", "year": "2026"}
            ]
        })))
        .mount(&server)
        .await;
    let cancel = CancellationToken::new();

    let event = SportEventId::new("sr:sport_event:1001").unwrap();
    let summary = client
        .sport_event_summary(&event, &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        summary.sport_event_status.unwrap().winner_id.as_deref(),
        Some("sr:competitor:14882")
    );

    let seasons = client.seasons(&cancel).await.unwrap().unwrap();
    assert_eq!(seasons.seasons.len(), 2);
}

#[tokio::test]
async fn test_missing_profile_is_absent_and_negatively_cached() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/competitors/sr:competitor:999/profile.json"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .expect(1)
        .mount(&server)
        .await;
    let cancel = CancellationToken::new();
    let id = CompetitorId::new("sr:competitor:999").unwrap();

    assert!(client.competitor_profile(&id, &cancel).await.unwrap().is_none());
    assert!(client.competitor_profile(&id, &cancel).await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_payload_is_absent() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/seasons.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let seasons = client.seasons(&CancellationToken::new()).await.unwrap();
    assert!(seasons.is_none());
}

#[tokio::test]
async fn test_versus_is_symmetric_and_fetched_once() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path(
            "/competitors/sr:competitor:14882/versus/sr:competitor:225050/summaries.json",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "competitors": [
                {"id": "sr:competitor:14882", "name": "Alpha, Aaron"},
                {"id": "sr:competitor:225050", "name": "Beta, Bruno"}
            ],
            "last_meetings": [
                {
                    "sport_event": {"id": "sr:sport_event:1"},
                    "sport_event_status": {"winner_id": "sr:competitor:14882"}
                },
                {
                    "sport_event": {"id": "sr:sport_event:2"},
                    "sport_event_status": {"winner_id": "sr:competitor:225050"}
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let cancel = CancellationToken::new();
    let a = CompetitorId::new("sr:competitor:14882").unwrap();
    let b = CompetitorId::new("sr:competitor:225050").unwrap();

    let ab = client.versus(&a, &b, &cancel).await.unwrap().unwrap();
    let ba = client.versus(&b, &a, &cancel).await.unwrap().unwrap();

    assert_eq!(ab, ba);
    assert_eq!(ab.wins(a.as_str()), 1);
    assert_eq!(ab.wins(b.as_str()), 1);
}

#[tokio::test]
async fn test_malformed_json_is_invalid_response() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/rankings.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client
        .rankings(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        statsgate_client::ApiError::InvalidResponse { .. }
    ));
}
