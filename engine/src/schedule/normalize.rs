//! Conversion of FlightAPI schedule payloads into [`FlightRecord`]s
//!
//! The provider nests everything several levels deep and omits whole
//! branches when data is unknown. Every access here goes through [`lookup`],
//! so a missing or `null` intermediate object simply yields `None`.

use sdk::types::{Aircraft, Airline, AirportInfo, FlightRecord};
use serde_json::Value;

/// Normalize a raw schedule payload.
///
/// Reads `airport.pluginData.schedule.arrivals.data`; when that list is
/// missing or empty it reads `...schedule.departures.data` instead. The
/// output therefore does not say which direction it came from.
pub fn normalize_flight_data(raw: &Value) -> Vec<FlightRecord> {
    let schedule = lookup(raw, &["airport", "pluginData", "schedule"]);

    let items = [
        schedule.and_then(|s| lookup(s, &["arrivals", "data"])),
        schedule.and_then(|s| lookup(s, &["departures", "data"])),
    ]
    .into_iter()
    .flatten()
    .find(|v| truthy(v))
    .and_then(Value::as_array);

    items
        .map(|items| items.iter().map(normalize_item).collect())
        .unwrap_or_default()
}

fn normalize_item(item: &Value) -> FlightRecord {
    let flight = lookup(item, &["flight"]).unwrap_or(&Value::Null);
    let at = |path: &[&str]| lookup(flight, path);

    FlightRecord {
        flight_number: pick_text([
            at(&["identification", "number", "default"]),
            at(&["identification", "number", "alternative"]),
        ]),
        airline: Airline {
            name: pick_text([
                at(&["airline", "name"]),
                at(&["airline", "short"]),
                at(&["airline", "fullName"]),
            ]),
            iata: pick_text([at(&["airline", "iata"]), at(&["airline", "code"])]),
        },
        departure_airport: airport_info(at(&["airport", "origin"])),
        arrival_airport: airport_info(at(&["airport", "destination"])),
        scheduled_departure_time: pick_value([
            at(&["scheduledDepartureTime"]),
            at(&["time", "scheduled", "departure"]),
        ]),
        estimated_departure_time: pick_value([
            at(&["estimatedDepartureTime"]),
            at(&["time", "estimated", "departure"]),
        ]),
        scheduled_arrival_time: pick_value([
            at(&["scheduledArrivalTime"]),
            at(&["time", "scheduled", "arrival"]),
        ]),
        estimated_arrival_time: pick_value([
            at(&["estimatedArrivalTime"]),
            at(&["time", "estimated", "arrival"]),
            at(&["time", "real", "utc"]),
        ]),
        status: at(&["status"]).cloned(),
        aircraft: Aircraft {
            model: pick_text([at(&["aircraft", "model"]), at(&["aircraft", "model", "text"])]),
            code: pick_text([at(&["aircraft", "code"]), at(&["aircraft", "model", "code"])]),
        },
    }
}

fn airport_info(airport: Option<&Value>) -> AirportInfo {
    let Some(airport) = airport else {
        return AirportInfo::default();
    };

    AirportInfo {
        iata: pick_text([lookup(airport, &["code", "iata"])]),
        city: pick_text([lookup(airport, &["position", "region", "city"])]),
        country: pick_text([lookup(airport, &["position", "country", "name"])]),
        country_code: pick_text([lookup(airport, &["position", "country", "code"])]),
    }
}

/// Walk `path` through nested objects. `null` at any level counts as absent.
fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.get(key))
        .filter(|v| !v.is_null())
}

/// Whether a value carries data: not null, false, zero or empty.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// First candidate that carries data, as-is
fn pick_value<const N: usize>(candidates: [Option<&Value>; N]) -> Option<Value> {
    candidates
        .into_iter()
        .flatten()
        .find(|v| truthy(v))
        .cloned()
}

/// First candidate that carries data and reads as text
fn pick_text<const N: usize>(candidates: [Option<&Value>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .filter(|v| truthy(v))
        .find_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}
