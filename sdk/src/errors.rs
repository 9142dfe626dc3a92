//! Error types and handling
//!
//! This module provides the error types used throughout the Flightdesk engine.
//! All errors implement the `FlightdeskErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! All error messages are scrubbed to ensure:
//! - No secrets (schedule API keys, answer-service keys) are included
//! - No request URLs carrying a credential are exposed
//! - All hints are safe to display to end users

use thiserror::Error;

/// Trait for Flightdesk error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait FlightdeskErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Configuration-class errors (missing credential, invalid airport) are
    /// not recoverable: the caller has to fix its input before retrying.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: invalid settings, missing credential, airport not allowed
/// - **Schedule source**: network/HTTP failures while fetching schedules
/// - **Persistence**: unreadable or malformed cache snapshot
/// - **Generation**: answer-service failures, including mid-stream
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, FlightdeskErrorExt};
///
/// let error = EngineError::SourceUnavailable("timeout".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::MissingCredential;
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schedule API key is required")]
    MissingCredential,

    #[error("Invalid airport code '{code}'. Allowed codes: {allowed}")]
    InvalidAirportCode { code: String, allowed: String },

    #[error("No airport selected")]
    AirportNotSelected,

    // Schedule source errors
    #[error("Schedule source unavailable: {0}")]
    SourceUnavailable(String),

    // Persistence errors
    #[error("Cache snapshot corrupt: {0}")]
    PersistenceCorrupt(String),

    // Answer generation errors
    #[error("Answer generation failed: {0}")]
    GenerationFailure(String),

    // Session errors
    #[error("Session dependencies not initialized")]
    SessionNotReady,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlightdeskErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            // Configuration errors
            Self::Config(_) => "Check your configuration file and environment variables",
            Self::MissingCredential => "Please enter your schedule API key",
            Self::InvalidAirportCode { .. } => "Pick one of the supported airports",
            Self::AirportNotSelected => "Please select an airport",

            // Schedule source errors
            Self::SourceUnavailable(_) => "Flight data is temporarily unavailable. Try again later",

            // Persistence errors
            Self::PersistenceCorrupt(_) => "Cached flight data was discarded and will be refetched",

            // Answer generation errors
            Self::GenerationFailure(_) => {
                "The assistant could not answer right now. Check the service key and network"
            }

            // Session errors
            Self::SessionNotReady => "Session is still starting up. Try again",

            Self::Serialization(_) => "Received malformed data",

            // Generic IO error
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Configuration-class errors fail fast
            Self::Config(_)
            | Self::MissingCredential
            | Self::InvalidAirportCode { .. }
            | Self::AirportNotSelected => false,

            // All other errors are potentially recoverable
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_fatal() {
        assert!(!EngineError::MissingCredential.is_recoverable());
        assert!(!EngineError::AirportNotSelected.is_recoverable());
        assert!(!EngineError::InvalidAirportCode {
            code: "XXX".to_string(),
            allowed: "DXB".to_string(),
        }
        .is_recoverable());
    }

    #[test]
    fn test_runtime_errors_are_recoverable() {
        assert!(EngineError::SourceUnavailable("503".to_string()).is_recoverable());
        assert!(EngineError::PersistenceCorrupt("eof".to_string()).is_recoverable());
        assert!(EngineError::GenerationFailure("reset".to_string()).is_recoverable());
    }

    #[test]
    fn test_invalid_airport_message_lists_allowed_codes() {
        let err = EngineError::InvalidAirportCode {
            code: "JFK".to_string(),
            allowed: "AMS, DXB".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("JFK"));
        assert!(msg.contains("AMS, DXB"));
    }
}
