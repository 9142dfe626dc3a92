//! Flightdesk SDK
//!
//! Shared library providing the error taxonomy and the normalized flight
//! data model used by the engine and by anything that consumes its output.

/// Error types and handling
pub mod errors;

/// Normalized flight schedule types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, FlightdeskErrorExt};
pub use types::{Aircraft, Airline, AirportInfo, Direction, FlightRecord, TodayFlights};
