//! Flightdesk Engine Library
//!
//! This library provides the core functionality of the Flightdesk engine.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret handling module
pub mod secrets;

/// Response cache with disk snapshots
pub mod cache;

/// Schedule provider abstraction layer
pub mod schedule;

/// LLM provider abstraction layer
pub mod llm;

/// Per-client session state
pub mod session;

/// Assistant orchestration module
pub mod assistant;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
