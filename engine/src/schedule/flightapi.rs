//! FlightAPI schedule provider
//!
//! Talks to `GET {base_url}/schedule/{api_key}?iata=..&mode=..&day=..`.
//! Responses go through the shared [`TtlCache`](crate::cache::TtlCache):
//! - a fresh cache entry answers without touching the network
//! - a successful fetch is cached and the snapshot rewritten
//! - on a source failure the cache is checked again (another session may
//!   have filled it meanwhile), then any expired entry is used and put back
//!   for the next failure, and only then does the fetch degrade to an empty
//!   payload
//!
//! Cache keys carry a SHA-256 digest of the key in place of the key itself,
//! so snapshot files never hold a credential.

use super::{normalize, ScheduleProvider};
use crate::cache::{CacheSnapshot, Lookup, SharedCache};
use crate::config::Config;
use crate::secrets::{scrub_url, SecretString};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use sdk::errors::EngineError;
use sdk::types::{Direction, FlightRecord};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Query parameters of a schedule request
#[derive(Debug, Clone, Serialize)]
struct ScheduleQuery<'a> {
    day: u32,
    iata: &'a str,
    mode: Direction,
}

/// Schedule provider backed by FlightAPI
pub struct FlightApiProvider {
    config: Arc<Config>,
    api_key: SecretString,
    client: Client,
    cache: SharedCache,
}

impl FlightApiProvider {
    /// Create a provider bound to a user's API key.
    ///
    /// # Errors
    ///
    /// * `MissingCredential` if the key is blank
    /// * `Config` if the HTTP client cannot be built
    pub fn new(
        config: Arc<Config>,
        api_key: SecretString,
        cache: SharedCache,
    ) -> Result<Self, EngineError> {
        if api_key.is_blank() {
            return Err(EngineError::MissingCredential);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            api_key,
            client,
            cache,
        })
    }

    async fn get(&self, path: &str, query: &ScheduleQuery<'_>) -> Result<Value, EngineError> {
        let url = format!(
            "{}{}/{}",
            self.config.flights.base_url,
            path,
            self.api_key.unsecure()
        );
        let cache_key =
            build_cache_key(&self.config.flights.base_url, path, &self.api_key, query)?;

        let stale = {
            let mut cache = self.cache.lock().await;
            match cache.lookup(&cache_key) {
                Lookup::Fresh(value) => {
                    debug!("Cache hit for {} {}", query.iata, query.mode);
                    return Ok(value);
                }
                Lookup::Stale(entry) => Some(entry),
                Lookup::Missing => None,
            }
        };

        info!("Fetching {} {} (day {})", query.iata, query.mode, query.day);

        match self.request(&url, query).await {
            Ok(data) => {
                let snapshot = {
                    let mut cache = self.cache.lock().await;
                    cache.set(cache_key, data.clone());
                    cache.snapshot()
                };
                write_snapshot(snapshot).await;
                Ok(data)
            }
            Err(e) => {
                let mut cache = self.cache.lock().await;
                let fallback = match cache.lookup(&cache_key) {
                    Lookup::Fresh(value) => {
                        warn!("Schedule source failed, serving cached data: {}", e);
                        return Ok(value);
                    }
                    Lookup::Stale(entry) => Some(entry),
                    Lookup::Missing => stale,
                };
                match fallback {
                    Some(entry) => {
                        warn!("Schedule source failed, serving expired data: {}", e);
                        let payload = entry.payload.clone();
                        cache.insert_entry(cache_key, entry);
                        Ok(payload)
                    }
                    None => Err(e),
                }
            }
        }
    }

    async fn request(&self, url: &str, query: &ScheduleQuery<'_>) -> Result<Value, EngineError> {
        let unavailable =
            |e: reqwest::Error| EngineError::SourceUnavailable(scrub_url(&e.to_string()));

        self.client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?
            .json::<Value>()
            .await
            .map_err(unavailable)
    }
}

/// Cache key of a schedule request: `{"p": params, "u": url}` with sorted
/// keys, where the URL's credential segment is the key's SHA-256 digest.
pub fn schedule_cache_key(
    base_url: &str,
    api_key: &SecretString,
    airport_code: &str,
    direction: Direction,
    day: u32,
) -> Result<String, EngineError> {
    let query = ScheduleQuery {
        day,
        iata: airport_code,
        mode: direction,
    };
    build_cache_key(base_url, "/schedule", api_key, &query)
}

fn build_cache_key(
    base_url: &str,
    path: &str,
    api_key: &SecretString,
    query: &ScheduleQuery<'_>,
) -> Result<String, EngineError> {
    let digest = Sha256::digest(api_key.unsecure().as_bytes());
    let url = format!("{}{}/{:x}", base_url, path, digest);
    // serde_json maps are ordered, so both levels come out sorted
    let params = serde_json::to_value(query)?;
    Ok(json!({ "p": params, "u": url }).to_string())
}

async fn write_snapshot(snapshot: Result<Option<CacheSnapshot>, EngineError>) {
    let result = match snapshot {
        Ok(Some(snapshot)) => snapshot.write().await,
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!("Failed to write cache snapshot: {}", e);
    }
}

#[async_trait]
impl ScheduleProvider for FlightApiProvider {
    fn name(&self) -> &str {
        "flightapi"
    }

    async fn fetch_schedule(
        &self,
        airport_code: &str,
        direction: Direction,
        day: u32,
    ) -> Result<Value, EngineError> {
        if !self.config.is_allowed_airport(airport_code) {
            return Err(EngineError::InvalidAirportCode {
                code: airport_code.to_string(),
                allowed: self.config.allowed_codes_display(),
            });
        }

        let query = ScheduleQuery {
            day,
            iata: airport_code,
            mode: direction,
        };

        match self.get("/schedule", &query).await {
            Ok(data) => Ok(data),
            Err(EngineError::SourceUnavailable(reason)) => {
                warn!("No {} data for {}: {}", direction, airport_code, reason);
                Ok(json!({}))
            }
            Err(e) => Err(e),
        }
    }

    fn normalize_flight_data(&self, raw: &Value) -> Vec<FlightRecord> {
        normalize::normalize_flight_data(raw)
    }
}
