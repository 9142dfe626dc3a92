//! Integration tests for the FlightAPI schedule provider
//!
//! Runs the provider against a local mock of the schedule source to check
//! caching, snapshot persistence and the degradation path on failures.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use flightdesk_engine::cache::{CacheEntry, SharedCache, TtlCache};
use flightdesk_engine::config::Config;
use flightdesk_engine::schedule::{schedule_cache_key, FlightApiProvider, ScheduleProvider};
use flightdesk_engine::secrets::SecretString;
use sdk::errors::EngineError;
use sdk::types::Direction;

const KEY: &str = "test-key";

fn config(base_url: &str, snapshot: Option<&Path>) -> Arc<Config> {
    let mut config = Config::default();
    config.flights.base_url = base_url.to_string();
    config.flights.cache_file_path = snapshot.map(Path::to_path_buf);
    config.flights.request_timeout_secs = 2;
    Arc::new(config)
}

fn provider(config: &Arc<Config>, cache: &SharedCache) -> FlightApiProvider {
    FlightApiProvider::new(
        Arc::clone(config),
        SecretString::new(KEY),
        Arc::clone(cache),
    )
    .unwrap()
}

fn schedule_body(direction: &str, flight: &str) -> Value {
    json!({
        "airport": {
            "pluginData": {
                "schedule": {
                    direction: {
                        "data": [{
                            "flight": {
                                "identification": { "number": { "default": flight } },
                                "airline": { "name": "Emirates", "code": { "iata": "EK" } },
                                "status": { "text": "Scheduled" }
                            }
                        }]
                    }
                }
            }
        }
    })
}

fn cache_key(base_url: &str, direction: Direction) -> String {
    schedule_cache_key(base_url, &SecretString::new(KEY), "DXB", direction, 1).unwrap()
}

#[tokio::test]
async fn test_second_fetch_is_served_from_cache() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("cache").join("flights.json");

    let body = schedule_body("arrivals", "EK001");
    Mock::given(method("GET"))
        .and(path(format!("/schedule/{}", KEY)))
        .and(query_param("iata", "DXB"))
        .and(query_param("mode", "arrivals"))
        .and(query_param("day", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server.uri(), Some(&snapshot));
    let cache = TtlCache::open_shared(Duration::from_secs(60), Some(snapshot.clone()));
    let provider = provider(&config, &cache);

    let first = provider
        .fetch_schedule("DXB", Direction::Arrivals, 1)
        .await
        .unwrap();
    let second = provider
        .fetch_schedule("DXB", Direction::Arrivals, 1)
        .await
        .unwrap();

    assert_eq!(first, body);
    assert_eq!(second, body);

    // Snapshot written and restorable by a fresh process
    assert!(snapshot.exists());
    let on_disk = std::fs::read_to_string(&snapshot).unwrap();
    assert!(!on_disk.contains(KEY));
    let mut restored = TtlCache::new(Duration::from_secs(60), Some(snapshot));
    assert_eq!(restored.load_from_disk().unwrap(), 1);
    assert_eq!(
        restored.get(&cache_key(&server.uri(), Direction::Arrivals)),
        Some(body)
    );
}

#[tokio::test]
async fn test_restored_snapshot_avoids_network() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("flights.json");

    let body = schedule_body("arrivals", "EK002");
    {
        let mut seed = TtlCache::new(Duration::from_secs(60), Some(snapshot.clone()));
        seed.set(cache_key(&server.uri(), Direction::Arrivals), body.clone());
        seed.dump_to_disk().unwrap();
    }

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let config = config(&server.uri(), Some(&snapshot));
    let cache = TtlCache::open_shared(Duration::from_secs(60), Some(snapshot));
    let provider = provider(&config, &cache);

    let data = provider
        .fetch_schedule("DXB", Direction::Arrivals, 1)
        .await
        .unwrap();
    assert_eq!(data, body);
}

#[tokio::test]
async fn test_source_failure_serves_expired_entry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server.uri(), None);
    let cache = TtlCache::open_shared(Duration::from_secs(60), None);
    let stale = schedule_body("arrivals", "EK003");
    cache.lock().await.insert_entry(
        cache_key(&server.uri(), Direction::Arrivals),
        CacheEntry {
            expires_at: Utc::now() - ChronoDuration::seconds(5),
            payload: stale.clone(),
        },
    );

    let provider = provider(&config, &cache);
    let data = provider
        .fetch_schedule("DXB", Direction::Arrivals, 1)
        .await
        .unwrap();

    assert_eq!(data, stale);
}

#[tokio::test]
async fn test_expired_entry_survives_a_prolonged_outage() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let config = config(&server.uri(), None);
    let cache = TtlCache::open_shared(Duration::from_secs(60), None);
    let stale = json!({ "stale": true });
    let key = cache_key(&server.uri(), Direction::Arrivals);
    cache.lock().await.insert_entry(
        key.clone(),
        CacheEntry {
            expires_at: Utc::now() - ChronoDuration::seconds(5),
            payload: stale.clone(),
        },
    );

    let provider = provider(&config, &cache);
    for _ in 0..3 {
        let data = provider
            .fetch_schedule("DXB", Direction::Arrivals, 1)
            .await
            .unwrap();
        assert_eq!(data, stale);
    }

    // Still expired: a plain read misses, so a recovered source is retried
    assert_eq!(cache.lock().await.get(&key), None);
}

#[tokio::test]
async fn test_source_failure_without_cache_degrades_to_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let config = config(&server.uri(), None);
    let cache = TtlCache::open_shared(Duration::from_secs(60), None);
    let provider = provider(&config, &cache);

    let data = provider
        .fetch_schedule("DXB", Direction::Departures, 1)
        .await
        .unwrap();
    assert_eq!(data, json!({}));

    let today = provider.get_today_flights("DXB").await.unwrap();
    assert!(today.is_empty());
    assert!(cache.lock().await.is_empty());
}

#[tokio::test]
async fn test_unreachable_source_degrades_to_empty() {
    let config = config("http://127.0.0.1:9", None);
    let cache = TtlCache::open_shared(Duration::from_secs(60), None);
    let provider = provider(&config, &cache);

    let today = provider.get_today_flights("LHR").await.unwrap();
    assert!(today.is_empty());
}

#[tokio::test]
async fn test_today_flights_fetches_both_directions() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("mode", "arrivals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(schedule_body("arrivals", "EK001")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("mode", "departures"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(schedule_body("departures", "EK002")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server.uri(), None);
    let cache = TtlCache::open_shared(Duration::from_secs(60), None);
    let provider = provider(&config, &cache);

    let today = provider.get_today_flights("DXB").await.unwrap();

    assert_eq!(today.arrivals.len(), 1);
    assert_eq!(today.arrivals[0].flight_number.as_deref(), Some("EK001"));
    assert_eq!(today.arrivals[0].airline.name.as_deref(), Some("Emirates"));
    assert_eq!(today.arrivals[0].status, Some(json!({ "text": "Scheduled" })));

    // Departures payload only has a departures list, which the fallback reads
    assert_eq!(today.departures.len(), 1);
    assert_eq!(today.departures[0].flight_number.as_deref(), Some("EK002"));

    assert_eq!(cache.lock().await.len(), 2);
}

#[tokio::test]
async fn test_invalid_airport_never_reaches_source() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let config = config(&server.uri(), None);
    let cache = TtlCache::open_shared(Duration::from_secs(60), None);
    let provider = provider(&config, &cache);

    match provider.get_today_flights("JFK").await {
        Err(EngineError::InvalidAirportCode { code, allowed }) => {
            assert_eq!(code, "JFK");
            assert!(allowed.contains("DXB"));
        }
        other => panic!("Expected InvalidAirportCode, got: {:?}", other),
    }
}
