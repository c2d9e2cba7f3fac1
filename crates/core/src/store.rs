use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::info;

use crate::session::{ChatHistory, Session};

/// A session together with its dialogue history and idle clock. The whole
/// entry sits behind one async mutex so concurrent turns for the same
/// session id are serialized (a turn's extract -> update -> propagate ->
/// validate sequence is not atomic otherwise).
#[derive(Debug)]
pub struct SessionEntry {
    pub session: Session,
    pub history: ChatHistory,
    pub last_touched: Instant,
}

impl SessionEntry {
    pub fn new(session: Session, history_limit: usize) -> Self {
        Self {
            session,
            history: ChatHistory::with_limit(history_limit),
            last_touched: Instant::now(),
        }
    }

    /// Resets the idle clock; called at the start of every turn.
    pub fn touch(&mut self) {
        self.last_touched = Instant::now();
    }
}

pub type SessionHandle = Arc<tokio::sync::Mutex<SessionEntry>>;

/// Injected session storage. Create/read/delete only; all mutation goes
/// through the engine's own operations while holding the entry lock.
pub trait SessionStore: Send + Sync {
    /// Inserts a fresh entry, replacing any previous session under the
    /// same id (documented overwrite semantics of `start`).
    fn insert(&self, session: Session) -> SessionHandle;
    fn get(&self, session_id: &str) -> Option<SessionHandle>;
    /// Removes and returns the entry so the caller can archive its final
    /// state; session and history go together, atomically.
    fn remove(&self, session_id: &str) -> Option<SessionHandle>;
    /// Evicts sessions idle past the TTL; returns the evicted ids.
    fn sweep_expired(&self) -> Vec<String>;
}

/// In-memory store with TTL-based eviction. Sessions do not survive a
/// process restart.
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<String, SessionHandle>>,
    ttl: Duration,
    history_limit: usize,
}

impl InMemorySessionStore {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

    pub fn new(ttl: Duration, history_limit: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            history_limit,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL, ChatHistory::DEFAULT_LIMIT)
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, session: Session) -> SessionHandle {
        let id = session.id.clone();
        let handle: SessionHandle = Arc::new(tokio::sync::Mutex::new(SessionEntry::new(
            session,
            self.history_limit,
        )));
        let previous = self
            .entries
            .lock()
            .expect("store lock poisoned")
            .insert(id.clone(), Arc::clone(&handle));
        if previous.is_some() {
            info!(
                event_name = "store.session_replaced",
                session_id = %id,
                "existing session overwritten by new start"
            );
        }
        handle
    }

    fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .get(session_id)
            .map(Arc::clone)
    }

    fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .remove(session_id)
    }

    fn sweep_expired(&self) -> Vec<String> {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let mut evicted = Vec::new();
        entries.retain(|id, handle| {
            // An entry whose lock is held has a turn in flight and is not
            // idle by definition.
            let Ok(entry) = handle.try_lock() else {
                return true;
            };
            if entry.last_touched.elapsed() >= self.ttl {
                evicted.push(id.clone());
                false
            } else {
                true
            }
        });
        drop(entries);
        for id in &evicted {
            info!(
                event_name = "store.session_expired",
                session_id = %id,
                "idle session evicted"
            );
        }
        evicted
    }
}
