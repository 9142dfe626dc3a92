//! Per-client conversation state
//!
//! Each client (browser tab, terminal, ...) gets an isolated [`SessionData`]
//! holding its history, selected airport, credential and the lazily built
//! schedule provider / answer generator pair. Sessions are handed out as
//! `Arc<Mutex<_>>` so one request at a time can work on a session while other
//! sessions proceed in parallel.

use crate::llm::{AnswerGenerator, Message};
use crate::schedule::ScheduleProvider;
use crate::secrets::SecretString;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Shared handle to one client's session
pub type SessionHandle = Arc<Mutex<SessionData>>;

/// Provider and generator built for a session, plus the credential they
/// were built with. Both exist together or not at all.
#[derive(Clone)]
pub struct SessionDependencies {
    pub provider: Arc<dyn ScheduleProvider>,
    pub generator: Arc<dyn AnswerGenerator>,
    pub credential: SecretString,
}

/// State owned by a single client
#[derive(Default)]
pub struct SessionData {
    /// Alternating user/assistant messages, oldest first
    pub history: Vec<Message>,
    /// Airport currently selected by the client
    pub selected: Option<String>,
    /// Schedule-source API key supplied by the client
    pub credential: SecretString,
    dependencies: Option<SessionDependencies>,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(&self) -> Option<&Arc<dyn ScheduleProvider>> {
        self.dependencies.as_ref().map(|d| &d.provider)
    }

    pub fn generator(&self) -> Option<&Arc<dyn AnswerGenerator>> {
        self.dependencies.as_ref().map(|d| &d.generator)
    }

    pub fn dependencies(&self) -> Option<&SessionDependencies> {
        self.dependencies.as_ref()
    }

    pub fn has_dependencies(&self) -> bool {
        self.dependencies.is_some()
    }

    pub(crate) fn install_dependencies(&mut self, dependencies: SessionDependencies) {
        self.dependencies = Some(dependencies);
    }

    /// Drop the provider and generator so the next request rebuilds them
    pub fn clear_dependencies(&mut self) {
        self.dependencies = None;
    }
}

struct SessionEntry {
    handle: SessionHandle,
    last_seen: Instant,
}

/// Registry of sessions keyed by client identity
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    idle_ttl: Option<Duration>,
}

impl SessionStore {
    /// Create a store. With `idle_ttl` set, sessions untouched for longer
    /// are dropped on the next lookup.
    pub fn new(idle_ttl: Option<Duration>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    /// Return the session for `client_id`, creating an empty one if needed
    pub async fn get(&self, client_id: &str) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        Self::evict_expired(&mut sessions, self.idle_ttl, now);

        let entry = sessions.entry(client_id.to_string()).or_insert_with(|| {
            info!("New session for client {}", client_id);
            SessionEntry {
                handle: Arc::new(Mutex::new(SessionData::new())),
                last_seen: now,
            }
        });
        entry.last_seen = now;
        Arc::clone(&entry.handle)
    }

    /// Record the airport a client selected (`None` clears it)
    pub async fn set_selected(&self, client_id: &str, airport: Option<String>) {
        let handle = self.get(client_id).await;
        let mut session = handle.lock().await;
        session.selected = airport.map(|code| code.trim().to_uppercase());
    }

    /// Store the schedule-source key a client supplied.
    ///
    /// Already built dependencies keep the key they were built with; call
    /// [`reset_dependencies`](Self::reset_dependencies) to rebind them.
    pub async fn set_credential(&self, client_id: &str, credential: impl Into<SecretString>) {
        let handle = self.get(client_id).await;
        let mut session = handle.lock().await;
        session.credential = credential.into();
    }

    pub async fn reset_dependencies(&self, client_id: &str) {
        let handle = self.get(client_id).await;
        handle.lock().await.clear_dependencies();
        debug!("Dependencies reset for client {}", client_id);
    }

    /// Mark a session as just used, e.g. when a long request finishes
    pub async fn touch(&self, client_id: &str) {
        if let Some(entry) = self.sessions.write().await.get_mut(client_id) {
            entry.last_seen = Instant::now();
        }
    }

    /// Forget a session entirely
    pub async fn remove(&self, client_id: &str) -> bool {
        self.sessions.write().await.remove(client_id).is_some()
    }

    /// Drop sessions idle for longer than the configured TTL.
    ///
    /// A session locked by a request in flight is never idle, however long
    /// ago it was looked up.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        Self::evict_expired(&mut sessions, self.idle_ttl, Instant::now())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn evict_expired(
        sessions: &mut HashMap<String, SessionEntry>,
        idle_ttl: Option<Duration>,
        now: Instant,
    ) -> usize {
        let Some(ttl) = idle_ttl else {
            return 0;
        };
        let before = sessions.len();
        sessions.retain(|_, entry| {
            now.duration_since(entry.last_seen) <= ttl || entry.handle.try_lock().is_err()
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {} idle sessions", evicted);
        }
        evicted
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(None)
    }
}
