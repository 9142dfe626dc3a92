//! TTL response cache with disk snapshots
//!
//! Keeps schedule responses in memory for a fixed time-to-live. Expiry is
//! lazy: an entry is only checked (and dropped) when it is looked up, so
//! there is no background sweeper. The whole cache can be written to a
//! single JSON snapshot and restored on the next start.
//!
//! # Snapshot format
//!
//! ```json
//! {"<key>": {"expires_at": "2026-01-01T12:00:00Z", "payload": {...}}}
//! ```

use chrono::{DateTime, Utc};
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Process-wide cache handle shared by every session's schedule provider
pub type SharedCache = Arc<Mutex<TtlCache>>;

/// A cached payload with its expiry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub expires_at: DateTime<Utc>,
    pub payload: Value,
}

impl CacheEntry {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Result of a lookup that distinguishes expired entries from missing ones
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Entry present and not expired
    Fresh(Value),
    /// Entry was present but expired; it has been removed from the cache and
    /// is handed back whole so it can be restored with
    /// [`insert_entry`](TtlCache::insert_entry)
    Stale(CacheEntry),
    /// No entry for the key
    Missing,
}

/// Serialized cache contents waiting to be written to disk
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    path: PathBuf,
    json: String,
    entries: usize,
}

impl CacheSnapshot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries in the snapshot
    pub fn entries(&self) -> usize {
        self.entries
    }

    fn parent(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// Write the snapshot without blocking the runtime.
    pub async fn write(self) -> Result<(), EngineError> {
        if let Some(parent) = self.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, self.json.as_bytes()).await?;

        debug!("Wrote {} cache entries to {:?}", self.entries, self.path);
        Ok(())
    }
}

/// In-memory key/value store with per-entry expiry
#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    store: HashMap<String, CacheEntry>,
    dump_path: Option<PathBuf>,
}

impl TtlCache {
    /// Create an empty cache. `dump_path` of `None` disables snapshots.
    pub fn new(ttl: Duration, dump_path: Option<PathBuf>) -> Self {
        Self {
            ttl,
            store: HashMap::new(),
            dump_path,
        }
    }

    /// Create a cache, restore it from its snapshot and wrap it for sharing.
    ///
    /// A corrupt snapshot is logged and ignored: the cache starts empty.
    pub fn open_shared(ttl: Duration, dump_path: Option<PathBuf>) -> SharedCache {
        let mut cache = Self::new(ttl, dump_path);
        match cache.load_from_disk() {
            Ok(0) => {}
            Ok(restored) => info!("Restored {} cached schedule responses", restored),
            Err(e) => warn!("Ignoring cache snapshot: {}", e),
        }
        Arc::new(Mutex::new(cache))
    }

    /// Return the payload for `key` if it has not expired.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        match self.lookup(key) {
            Lookup::Fresh(value) => Some(value),
            Lookup::Stale(_) | Lookup::Missing => None,
        }
    }

    /// Like [`get`](Self::get), but hands back an expired payload instead of
    /// discarding it silently. The expired entry is still removed.
    pub fn lookup(&mut self, key: &str) -> Lookup {
        let now = Utc::now();
        match self.store.get(key).map(|entry| entry.is_valid_at(now)) {
            Some(true) => self
                .store
                .get(key)
                .map_or(Lookup::Missing, |entry| Lookup::Fresh(entry.payload.clone())),
            Some(false) => {
                debug!("Cache entry expired");
                self.store
                    .remove(key)
                    .map_or(Lookup::Missing, Lookup::Stale)
            }
            None => Lookup::Missing,
        }
    }

    /// Store `value` under `key` for the configured TTL, replacing any
    /// previous entry.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let ttl = chrono::Duration::from_std(self.ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        self.store.insert(
            key.into(),
            CacheEntry {
                expires_at: Utc::now() + ttl,
                payload: value,
            },
        );
    }

    /// Insert an entry with an explicit expiry
    pub fn insert_entry(&mut self, key: impl Into<String>, entry: CacheEntry) {
        self.store.insert(key.into(), entry);
    }

    /// Number of entries currently held, including not-yet-evicted expired ones
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    pub fn dump_path(&self) -> Option<&Path> {
        self.dump_path.as_deref()
    }

    /// Serialize every still-valid entry for writing to the snapshot file.
    ///
    /// Returns `None` when no path is configured. Only the serialization
    /// happens here, so a caller holding the shared lock can release it
    /// before the file is written.
    pub fn snapshot(&self) -> Result<Option<CacheSnapshot>, EngineError> {
        let Some(path) = self.dump_path.clone() else {
            return Ok(None);
        };

        let now = Utc::now();
        let valid: BTreeMap<&str, &CacheEntry> = self
            .store
            .iter()
            .filter(|(_, entry)| entry.is_valid_at(now))
            .map(|(key, entry)| (key.as_str(), entry))
            .collect();

        Ok(Some(CacheSnapshot {
            path,
            entries: valid.len(),
            json: serde_json::to_string(&valid)?,
        }))
    }

    /// Write every still-valid entry to the snapshot file, blocking.
    ///
    /// Parent directories are created as needed. Does nothing when no path
    /// is configured. The write is not atomic.
    pub fn dump_to_disk(&self) -> Result<(), EngineError> {
        let Some(snapshot) = self.snapshot()? else {
            return Ok(());
        };

        if let Some(parent) = snapshot.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&snapshot.path, &snapshot.json)?;

        debug!("Wrote {} cache entries to {:?}", snapshot.entries, snapshot.path);
        Ok(())
    }

    /// Restore entries from the snapshot file, skipping expired ones.
    ///
    /// Returns the number of restored entries. A missing file restores
    /// nothing; an unreadable or malformed one yields `PersistenceCorrupt`
    /// and leaves the cache unchanged.
    pub fn load_from_disk(&mut self) -> Result<usize, EngineError> {
        let Some(path) = self.dump_path.as_deref() else {
            return Ok(0);
        };

        if !path.exists() {
            return Ok(0);
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::PersistenceCorrupt(format!("{:?}: {}", path, e)))?;

        let snapshot: BTreeMap<String, CacheEntry> = serde_json::from_str(&contents)
            .map_err(|e| EngineError::PersistenceCorrupt(format!("{:?}: {}", path, e)))?;

        let now = Utc::now();
        let mut restored = 0;
        for (key, entry) in snapshot {
            if entry.is_valid_at(now) {
                self.store.insert(key, entry);
                restored += 1;
            }
        }

        Ok(restored)
    }
}
