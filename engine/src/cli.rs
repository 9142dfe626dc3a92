//! CLI interface for Flightdesk
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Flightdesk flight assistant
///
/// Answers questions about today's arrivals and departures at an airport,
/// grounded in live schedule data.
#[derive(Parser, Debug)]
#[command(name = "flightdesk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Schedule-source options shared by the commands that fetch flights
#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// Airport IATA code (must be one of the allowed codes)
    #[arg(short, long, value_name = "CODE")]
    pub airport: String,

    /// FlightAPI key for the schedule source
    #[arg(long, env = "FLIGHTAPI_KEY", hide_env_values = true, value_name = "KEY")]
    pub api_key: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask a single question and stream the answer
    Ask {
        #[command(flatten)]
        source: SourceArgs,

        /// The question to ask
        question: String,
    },

    /// Start an interactive conversation
    Chat {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print today's normalized arrivals and departures as JSON
    Flights {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Show the effective configuration (secrets omitted)
    Config,
}
