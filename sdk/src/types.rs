//! Normalized flight schedule types
//!
//! Every schedule provider converts its native payload into these shapes.
//! All leaves are optional: a field missing from the source stays `None`
//! (serialized as `null`) and is never replaced with a placeholder value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Direction of a schedule query
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Arrivals,
    Departures,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Arrivals => "arrivals",
            Direction::Departures => "departures",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arrivals" => Ok(Direction::Arrivals),
            "departures" => Ok(Direction::Departures),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Operating airline
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Airline {
    pub name: Option<String>,
    pub iata: Option<String>,
}

/// Origin or destination airport of a flight
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AirportInfo {
    pub iata: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

/// Aircraft operating a flight
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Aircraft {
    pub model: Option<String>,
    pub code: Option<String>,
}

/// A single flight in the common shape shared by all providers
///
/// Timestamps and status are carried in the provider's own representation
/// (usually strings or epoch numbers) and are not reparsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecord {
    pub flight_number: Option<String>,
    pub airline: Airline,
    pub departure_airport: AirportInfo,
    pub arrival_airport: AirportInfo,
    pub scheduled_departure_time: Option<Value>,
    pub estimated_departure_time: Option<Value>,
    pub scheduled_arrival_time: Option<Value>,
    pub estimated_arrival_time: Option<Value>,
    pub status: Option<Value>,
    pub aircraft: Aircraft,
}

/// Today's arrivals and departures for one airport
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TodayFlights {
    pub arrivals: Vec<FlightRecord>,
    pub departures: Vec<FlightRecord>,
}

impl TodayFlights {
    /// Total number of flights across both directions
    pub fn len(&self) -> usize {
        self.arrivals.len() + self.departures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrivals.is_empty() && self.departures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direction_parsing() {
        assert_eq!("arrivals".parse::<Direction>().unwrap(), Direction::Arrivals);
        assert_eq!("Departures".parse::<Direction>().unwrap(), Direction::Departures);
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(Direction::Arrivals.to_string(), "arrivals");
    }

    #[test]
    fn test_empty_record_serializes_nulls() {
        let record = FlightRecord::default();
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["flightNumber"], Value::Null);
        assert_eq!(value["airline"], json!({"name": null, "iata": null}));
        assert_eq!(
            value["departureAirport"],
            json!({"iata": null, "city": null, "country": null, "countryCode": null})
        );
        assert_eq!(value["aircraft"], json!({"model": null, "code": null}));
        assert_eq!(value["status"], Value::Null);
    }
}
