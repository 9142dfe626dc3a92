//! Secret handling
//!
//! Credentials in Flightdesk come from two places: the answer-service key in
//! the configuration, and the schedule API key each user types into their
//! session. Both are carried as [`SecretString`] so they never end up in logs.
//! The schedule source takes its key as a path segment, so request URLs are
//! passed through [`scrub_url`] before being logged or put into an error.

pub mod string;

pub use string::SecretString;

use regex::Regex;
use std::sync::OnceLock;

/// Patterns for credentials that may appear inside URLs or error text.
static SECRET_PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

/// Initializes and returns the secret detection patterns.
///
/// Patterns match:
/// - Schedule API keys in the path: /schedule/<key>
/// - OpenAI-style keys: sk-...
/// - Bearer tokens: Bearer <token>
fn get_secret_patterns() -> &'static Vec<(Regex, &'static str)> {
    SECRET_PATTERNS.get_or_init(|| {
        [
            (r"/schedule/[^/?#\s]+", "/schedule/[REDACTED]"),
            (r"sk-[a-zA-Z0-9\-_]{8,}", "[REDACTED]"),
            (r"Bearer\s+[^\s]+", "Bearer [REDACTED]"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern).ok().map(|re| (re, replacement))
        })
        .collect()
    })
}

/// Remove credentials from a URL or message before it is logged.
pub fn scrub_url(text: &str) -> String {
    get_secret_patterns()
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}
