//! Configuration management
//!
//! This module builds the immutable Flightdesk configuration once at startup.
//! The resulting `Config` is wrapped in an `Arc` and handed to every component
//! that needs it; nothing reads settings from ambient global state.
//!
//! # Configuration Sections
//!
//! - **core**: log level
//! - **flights**: airport allow-list, schedule source URL, cache TTL and snapshot path
//! - **assistant**: system prompt, history length, session idle TTL
//! - **llm**: answer-service base URL, model and key
//!
//! # Sources
//!
//! Lowest to highest precedence:
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. Environment variables (`ALLOWED_AIRPORT_CODES`, `FLIGHTAPI_BASE_URL`,
//!    `CACHE_TTL_SECONDS`, `CACHE_FILE_PATH`, `SYSTEM_PROMPT`,
//!    `MEMORY_LEN_MESSAGES`, `SESSION_IDLE_TTL_SECONDS`, `OPENAI_API_KEY`,
//!    `OPENAI_MODEL`, `OPENAI_BASE_URL`, `LOG_LEVEL`)
//!
//! # Examples
//!
//! ```no_run
//! use flightdesk_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! println!("Airports: {}", config.allowed_codes_display());
//! # Ok(())
//! # }
//! ```

use crate::secrets::SecretString;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Schedule source and cache settings
    #[serde(default)]
    pub flights: FlightsConfig,

    /// Conversation settings
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Answer-service settings
    #[serde(default)]
    pub llm: LLMConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Schedule source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightsConfig {
    /// Airport IATA codes users may query
    #[serde(default = "default_allowed_airport_codes")]
    pub allowed_airport_codes: BTreeSet<String>,

    /// Base URL of the schedule source
    #[serde(default = "default_flightapi_base_url")]
    pub base_url: String,

    /// Lifetime of a cached schedule response
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// Snapshot file for the response cache (absent disables persistence)
    #[serde(default = "default_cache_file_path")]
    pub cache_file_path: Option<PathBuf>,

    /// Per-request timeout for the schedule source
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Conversation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Instructions placed first in every prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Maximum number of messages kept in a session's history
    #[serde(default = "default_memory_len_messages")]
    pub memory_len_messages: usize,

    /// Idle time after which a session is evicted (0 keeps sessions forever)
    #[serde(default)]
    pub session_idle_ttl_seconds: u64,
}

/// Answer-service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Service key; never written back out
    #[serde(default, skip_serializing)]
    pub api_key: SecretString,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_allowed_airport_codes() -> BTreeSet<String> {
    ["DXB", "LHR", "CDG", "SIN", "HKG", "AMS"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_flightapi_base_url() -> String {
    "https://api.flightapi.io".to_string()
}

fn default_cache_ttl_seconds() -> u64 {
    60 * 60 * 12
}

fn default_cache_file_path() -> Option<PathBuf> {
    Some(PathBuf::from("tmp/flight_cache.json"))
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_system_prompt() -> String {
    "You are an aviation assistant. Answer strictly about the selected airport and only for today. \
     Use ONLY the provided dataset when answering. \
     If the question is outside the dataset scope, say that you just have no enough data for answer. "
        .to_string()
}

fn default_memory_len_messages() -> usize {
    40
}

fn default_openai_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_openai_model() -> String {
    "tngtech/deepseek-r1t2-chimera:free".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for FlightsConfig {
    fn default() -> Self {
        Self {
            allowed_airport_codes: default_allowed_airport_codes(),
            base_url: default_flightapi_base_url(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_file_path: default_cache_file_path(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            memory_len_messages: default_memory_len_messages(),
            session_idle_ttl_seconds: 0,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            api_key: SecretString::default(),
        }
    }
}

impl Config {
    /// Build the configuration from defaults, an optional TOML file and the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or parsed
    /// - An environment variable holds an unparsable number
    /// - Validation fails
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate_and_process()?;

        Ok(config)
    }

    /// Load configuration from a specific path, without environment overrides
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let mut config = Self::read_file(path)?;
        config.validate_and_process()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Overlay environment-style settings.
    ///
    /// `lookup` returns the value for a variable name, which keeps this
    /// testable without mutating the process environment. Empty values are
    /// ignored except for `CACHE_FILE_PATH`, where empty disables persistence.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(level) = non_empty("LOG_LEVEL") {
            self.core.log_level = level.trim().to_lowercase();
        }

        if let Some(codes) = non_empty("ALLOWED_AIRPORT_CODES") {
            let parsed: BTreeSet<String> = codes
                .split(',')
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.flights.allowed_airport_codes = parsed;
            }
        }

        if let Some(url) = non_empty("FLIGHTAPI_BASE_URL") {
            self.flights.base_url = url;
        }

        if let Some(ttl) = non_empty("CACHE_TTL_SECONDS") {
            self.flights.cache_ttl_seconds = parse_number("CACHE_TTL_SECONDS", &ttl)?;
        }

        if let Some(path) = lookup("CACHE_FILE_PATH") {
            let path = path.trim();
            self.flights.cache_file_path = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        if let Some(prompt) = non_empty("SYSTEM_PROMPT") {
            self.assistant.system_prompt = prompt;
        }

        if let Some(len) = non_empty("MEMORY_LEN_MESSAGES") {
            self.assistant.memory_len_messages = parse_number("MEMORY_LEN_MESSAGES", &len)?;
        }

        if let Some(ttl) = non_empty("SESSION_IDLE_TTL_SECONDS") {
            self.assistant.session_idle_ttl_seconds =
                parse_number("SESSION_IDLE_TTL_SECONDS", &ttl)?;
        }

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.llm.api_key = SecretString::new(key);
        }

        if let Some(model) = non_empty("OPENAI_MODEL") {
            self.llm.model = model;
        }

        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }

        Ok(())
    }

    /// Validate and normalize the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The log level is unknown
    /// - The airport allow-list is empty
    /// - The cache TTL or history length is zero
    /// - A base URL is not http(s)
    pub fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        self.flights.allowed_airport_codes = self
            .flights
            .allowed_airport_codes
            .iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();

        if self.flights.allowed_airport_codes.is_empty() {
            return Err(EngineError::Config(
                "allowed_airport_codes must not be empty".to_string(),
            ));
        }

        if self.flights.cache_ttl_seconds == 0 {
            return Err(EngineError::Config(
                "cache_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.assistant.memory_len_messages == 0 {
            return Err(EngineError::Config(
                "memory_len_messages must be greater than 0".to_string(),
            ));
        }

        for (name, url) in [
            ("flights.base_url", &mut self.flights.base_url),
            ("llm.base_url", &mut self.llm.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(EngineError::Config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
            while url.ends_with('/') {
                url.pop();
            }
        }

        if self
            .flights
            .cache_file_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            self.flights.cache_file_path = None;
        }

        Ok(())
    }

    /// Whether `code` is one of the configured airports
    pub fn is_allowed_airport(&self, code: &str) -> bool {
        self.flights.allowed_airport_codes.contains(code)
    }

    /// Allowed airport codes as a sorted, comma separated list
    pub fn allowed_codes_display(&self) -> String {
        self.flights
            .allowed_airport_codes
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.flights.cache_ttl_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.flights.request_timeout_secs)
    }

    /// Idle TTL for sessions, `None` when eviction is disabled
    pub fn session_idle_ttl(&self) -> Option<Duration> {
        match self.assistant.session_idle_ttl_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Render the effective configuration as TOML (the service key is omitted)
    pub fn to_toml_redacted(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, EngineError> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::Config(format!("{} must be a number, got '{}'", key, value)))
}
