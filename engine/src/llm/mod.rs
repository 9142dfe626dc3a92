//! Answer Generation Layer
//!
//! This module provides a common interface for streaming answers from a
//! language model. The [`AnswerGenerator`] trait is what the assistant
//! orchestrator depends on; [`openai::OpenAIProvider`] implements it for any
//! OpenAI-compatible chat-completions endpoint (OpenAI, OpenRouter, ...).
//!
//! Generators yield text *deltas*. Turning deltas into the accumulated
//! prefixes the UI renders is the orchestrator's job.

use async_trait::async_trait;
use futures::stream::BoxStream;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod openai;
pub mod sse;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Incremental text produced by a generator
pub type TextStream = BoxStream<'static, Result<String>>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<LLMError> for EngineError {
    fn from(err: LLMError) -> Self {
        EngineError::GenerationFailure(crate::secrets::scrub_url(&err.to_string()))
    }
}

/// Message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new human (user) message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Human message
    User,

    /// Assistant message
    Assistant,

    /// System message
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Streaming answer generator that all providers must implement
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Returns the name of the provider (e.g., "openai")
    fn name(&self) -> &str;

    /// Returns the model identifier requests are bound to
    fn model(&self) -> &str;

    /// Start generating an answer for `messages`
    ///
    /// # Returns
    /// * `Ok(TextStream)` - text deltas in order; dropping the stream closes
    ///   the underlying connection
    /// * `Err(LLMError)` - if the request could not be started
    async fn stream(&self, messages: &[Message]) -> Result<TextStream>;
}
