//! In-memory view-state store and record lookup for testing and development

use crate::core::error::StorageError;
use crate::core::validation::RecordLookup;
use crate::state::{StateStore, ViewKey, ViewState};
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

type Views = BTreeMap<ViewKey, ViewState>;
type Sessions = IndexMap<String, Views>;

/// In-memory view-state store
///
/// Meant for tests and development. Sessions never expire: every client
/// that arrives without a session header and sends a command adds one, so a
/// long-running process should either set [`with_max_sessions`] or plug in a
/// store backed by real session storage.
///
/// Uses RwLock for thread-safe access; clones share the same data.
///
/// [`with_max_sessions`]: Self::with_max_sessions
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    sessions: Arc<RwLock<Sessions>>,
    max_sessions: Option<usize>,
}

impl InMemoryStateStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max` sessions, dropping the least recently written ones
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max.max(1));
        self
    }

    /// Number of sessions holding state
    pub fn session_count(&self) -> Result<usize, StorageError> {
        Ok(self.sessions.read().map_err(poisoned)?.len())
    }

    /// Store `views` as the most recent session, evicting over the cap
    fn put(&self, sessions: &mut Sessions, session: &str, views: Views) {
        sessions.shift_remove(session);
        sessions.insert(session.to_string(), views);

        if let Some(max) = self.max_sessions {
            while sessions.len() > max {
                if let Some((evicted, _)) = sessions.shift_remove_index(0) {
                    tracing::debug!(session = %evicted, max, "evicted view-state session");
                }
            }
        }
    }

    /// Number of views with state in a session
    pub fn view_count(&self, session: &str) -> Result<usize, StorageError> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(session).map(BTreeMap::len).unwrap_or(0))
    }

    /// Export the persisted layout of a session, keyed by view key
    pub fn snapshot(&self, session: &str) -> Result<serde_json::Value, StorageError> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        let views = sessions.get(session).cloned().unwrap_or_default();
        Ok(serde_json::to_value(views)?)
    }

    /// Replace the state of a session with a previously exported snapshot
    pub fn restore(&self, session: &str, snapshot: serde_json::Value) -> Result<(), StorageError> {
        let views: Views = serde_json::from_value(snapshot)?;
        let views: Views = views.into_iter().filter(|(_, s)| !s.is_empty()).collect();

        let mut sessions = self.sessions.write().map_err(poisoned)?;
        if views.is_empty() {
            sessions.shift_remove(session);
        } else {
            self.put(&mut sessions, session, views);
        }
        Ok(())
    }

    /// Drop everything stored for a session
    pub fn clear_session(&self, session: &str) -> Result<(), StorageError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.shift_remove(session);
        Ok(())
    }
}

impl StateStore for InMemoryStateStore {
    fn get(&self, session: &str, key: &ViewKey) -> Result<Option<ViewState>, StorageError> {
        let sessions = self.sessions.read().map_err(poisoned)?;

        Ok(sessions.get(session).and_then(|views| views.get(key)).cloned())
    }

    fn set(&self, session: &str, key: &ViewKey, state: ViewState) -> Result<(), StorageError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;

        let mut views = sessions.shift_remove(session).unwrap_or_default();
        views.insert(key.clone(), state);
        self.put(&mut sessions, session, views);

        Ok(())
    }

    fn remove(&self, session: &str, key: &ViewKey) -> Result<(), StorageError> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;

        if let Some(views) = sessions.get_mut(session) {
            views.remove(key);
            if views.is_empty() {
                sessions.shift_remove(session);
            }
        }

        Ok(())
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StorageError {
    StorageError::LockPoisoned {
        message: e.to_string(),
    }
}

/// In-memory record lookup: entity name -> known ids
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecords {
    records: HashMap<String, HashSet<String>>,
}

impl InMemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, entity: impl Into<String>, id: impl Into<String>) -> Self {
        self.insert(entity, id);
        self
    }

    pub fn insert(&mut self, entity: impl Into<String>, id: impl Into<String>) {
        self.records.entry(entity.into()).or_default().insert(id.into());
    }
}

impl RecordLookup for InMemoryRecords {
    fn record_exists(&self, entity: &str, id: &str) -> bool {
        self.records
            .get(entity)
            .is_some_and(|ids| ids.contains(id))
    }
}
