//! Assistant orchestration
//!
//! [`FlightAssistant`] ties a session to its schedule provider and answer
//! generator:
//! 1. `ensure_dependencies` builds both once per session
//! 2. `build_messages` grounds the prompt in today's schedule
//! 3. `stream_answer` yields the answer as growing prefixes
//! 4. `persist_history` records the exchange within the memory bound

use crate::cache::{SharedCache, TtlCache};
use crate::config::Config;
use crate::llm::openai::OpenAIProvider;
use crate::llm::{AnswerGenerator, Message};
use crate::schedule::{FlightApiProvider, ScheduleProvider};
use crate::secrets::SecretString;
use crate::session::{SessionData, SessionDependencies};
use chrono::{NaiveDate, Utc};
use futures::stream::{BoxStream, StreamExt};
use sdk::errors::EngineError;
use sdk::types::{FlightRecord, TodayFlights};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stream of accumulated answer prefixes; every item extends the previous one
pub type AnswerStream = BoxStream<'static, Result<String, EngineError>>;

/// Outcome of [`FlightAssistant::ensure_dependencies`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyState {
    /// Provider and generator were just built
    Created,
    /// Existing instances were kept
    Reused,
    /// Existing instances were kept although the session's key changed
    CredentialChanged,
}

/// Grounding data embedded in the prompt
#[derive(Debug, Serialize)]
struct GroundingDataset<'a> {
    airport: &'a str,
    date: String,
    arrivals: &'a [FlightRecord],
    departures: &'a [FlightRecord],
}

/// Orchestrates schedule grounding and answer streaming for sessions
pub struct FlightAssistant {
    config: Arc<Config>,
    cache: SharedCache,
}

impl FlightAssistant {
    /// Create an assistant with the process-wide cache restored from its
    /// snapshot file.
    pub fn new(config: Arc<Config>) -> Self {
        let cache = TtlCache::open_shared(
            config.cache_ttl(),
            config.flights.cache_file_path.clone(),
        );
        Self::with_cache(config, cache)
    }

    pub fn with_cache(config: Arc<Config>, cache: SharedCache) -> Self {
        Self { config, cache }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Make sure the session has a schedule provider and answer generator.
    ///
    /// Idempotent: once built, the same instances are kept for the life of
    /// the session. A different `credential` does not rebuild them; it is
    /// reported as [`DependencyState::CredentialChanged`].
    ///
    /// # Errors
    ///
    /// * `MissingCredential` if nothing is built yet and the key is blank
    pub fn ensure_dependencies(
        &self,
        session: &mut SessionData,
        credential: &SecretString,
    ) -> Result<DependencyState, EngineError> {
        if let Some(existing) = session.dependencies() {
            if existing.credential != *credential {
                warn!("Session key changed; keeping the provider built with the previous key");
                return Ok(DependencyState::CredentialChanged);
            }
            return Ok(DependencyState::Reused);
        }

        let provider: Arc<dyn ScheduleProvider> = Arc::new(FlightApiProvider::new(
            Arc::clone(&self.config),
            credential.clone(),
            Arc::clone(&self.cache),
        )?);
        let generator: Arc<dyn AnswerGenerator> =
            Arc::new(OpenAIProvider::new(self.config.llm.clone()));

        info!(
            "Session dependencies ready: schedule={}, model={}",
            provider.name(),
            generator.model()
        );

        session.install_dependencies(SessionDependencies {
            provider,
            generator,
            credential: credential.clone(),
        });
        Ok(DependencyState::Created)
    }

    /// Assemble the prompt for `question` about `airport`.
    ///
    /// Layout: system prompt, `SELECTED_AIRPORT=<code>`, `DATASET_JSON=<json>`,
    /// prior history, then the question.
    ///
    /// # Errors
    ///
    /// * `SessionNotReady` if dependencies have not been built
    /// * `InvalidAirportCode` if the airport is not allowed
    pub async fn build_messages(
        &self,
        session: &SessionData,
        airport: &str,
        question: &str,
    ) -> Result<Vec<Message>, EngineError> {
        let provider = session.provider().ok_or(EngineError::SessionNotReady)?;
        let today = provider.get_today_flights(airport).await?;
        debug!(
            "Grounding {} with {} arrivals, {} departures",
            airport,
            today.arrivals.len(),
            today.departures.len()
        );

        let dataset = grounding_json(airport, &today, Utc::now().date_naive())?;

        let mut messages = Vec::with_capacity(session.history.len() + 4);
        messages.push(Message::system(self.config.assistant.system_prompt.clone()));
        messages.push(Message::system(format!("SELECTED_AIRPORT={}", airport)));
        messages.push(Message::system(format!("DATASET_JSON={}", dataset)));
        messages.extend(session.history.iter().cloned());
        messages.push(Message::user(question));
        Ok(messages)
    }

    /// Start generating an answer and expose it as accumulated prefixes.
    ///
    /// The request is issued before this returns; errors starting it come
    /// back directly, later failures end the stream with an `Err` item.
    pub async fn stream_answer(
        &self,
        session: &SessionData,
        messages: Vec<Message>,
    ) -> Result<AnswerStream, EngineError> {
        let generator = session.generator().ok_or(EngineError::SessionNotReady)?;
        let deltas = generator.stream(&messages).await?;

        let prefixes = deltas.scan(String::new(), |answer, delta| {
            let item = match delta {
                Ok(text) => {
                    answer.push_str(&text);
                    Ok(answer.clone())
                }
                Err(e) => Err(EngineError::from(e)),
            };
            futures::future::ready(Some(item))
        });
        Ok(prefixes.boxed())
    }

    /// Append the exchange and drop the oldest messages beyond the limit
    pub fn persist_history(&self, session: &mut SessionData, question: &str, answer: &str) {
        session.history.push(Message::user(question));
        session.history.push(Message::assistant(answer));
        trim_history(
            &mut session.history,
            self.config.assistant.memory_len_messages,
        );
    }
}

/// Keep only the newest `max` messages
pub fn trim_history(history: &mut Vec<Message>, max: usize) {
    if history.len() > max {
        let excess = history.len() - max;
        history.drain(..excess);
    }
}

fn grounding_json(
    airport: &str,
    today: &TodayFlights,
    date: NaiveDate,
) -> Result<String, EngineError> {
    let dataset = GroundingDataset {
        airport,
        date: date.format("%Y-%m-%d").to_string(),
        arrivals: &today.arrivals,
        departures: &today.departures,
    };
    Ok(serde_json::to_string(&dataset)?)
}
