//! Schedule Provider Abstraction Layer
//!
//! A schedule provider fetches raw airport schedules from an external source
//! and turns them into the common [`FlightRecord`] shape. The
//! [`ScheduleProvider`] trait is what the assistant talks to, so tests and
//! alternative sources can be swapped in without touching the orchestration.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::{Direction, FlightRecord, TodayFlights};
use serde_json::Value;

pub mod flightapi;
pub mod normalize;

pub use flightapi::{schedule_cache_key, FlightApiProvider};
pub use normalize::normalize_flight_data;

/// Day offset used for "today" by the schedule source
pub const TODAY: u32 = 1;

/// Schedule provider trait that all sources must implement
#[async_trait]
pub trait ScheduleProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "flightapi")
    fn name(&self) -> &str;

    /// Fetch the raw schedule for an airport.
    ///
    /// # Errors
    ///
    /// * `InvalidAirportCode` if the airport is not allowed.
    ///
    /// Source failures are not errors: the provider falls back to cached data
    /// and otherwise returns an empty payload.
    async fn fetch_schedule(
        &self,
        airport_code: &str,
        direction: Direction,
        day: u32,
    ) -> Result<Value, EngineError>;

    /// Convert a raw payload into normalized records
    fn normalize_flight_data(&self, raw: &Value) -> Vec<FlightRecord>;

    /// Fetch today's arrivals and departures concurrently and normalize both.
    async fn get_today_flights(&self, airport_code: &str) -> Result<TodayFlights, EngineError> {
        let (arrivals, departures) = tokio::join!(
            self.fetch_schedule(airport_code, Direction::Arrivals, TODAY),
            self.fetch_schedule(airport_code, Direction::Departures, TODAY),
        );

        Ok(TodayFlights {
            arrivals: self.normalize_flight_data(&arrivals?),
            departures: self.normalize_flight_data(&departures?),
        })
    }
}
