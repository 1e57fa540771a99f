use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tracing::debug;

use crate::{Error, Result, plugin::BotSession};

/// Registry of connected sessions across all adapters, keyed by host ID.
///
/// Created once by process startup and handed to every adapter. The map is
/// the only state sessions share.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<dyn BotSession>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a session, returning the one it replaced.
    pub fn register(&self, session: Arc<dyn BotSession>) -> Option<Arc<dyn BotSession>> {
        let self_id = session.self_id().to_string();
        debug!(self_id, "registering session");
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.insert(self_id, session)
    }

    pub fn get(&self, self_id: &str) -> Option<Arc<dyn BotSession>> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(self_id).cloned()
    }

    /// Like [`get`](Self::get), but a missing session is an error.
    pub fn require(&self, self_id: &str) -> Result<Arc<dyn BotSession>> {
        self.get(self_id).ok_or_else(|| Error::unknown_session(self_id))
    }

    pub fn remove(&self, self_id: &str) -> Option<Arc<dyn BotSession>> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(self_id)
    }

    /// Registered host IDs, sorted.
    pub fn list(&self) -> Vec<String> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
