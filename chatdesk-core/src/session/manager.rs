//! In-memory store of named chat sessions

use super::store::Message;
use crate::{Error, Result};
use indexmap::IndexMap;
use tracing::{debug, warn};

const GENERATED_PREFIX: &str = "Chat ";

/// Holds every chat session, in creation order, plus the active one.
///
/// Names are unique, and the active name (when set) always refers to a
/// session in the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStore {
    sessions: IndexMap<String, Vec<Message>>,
    active: Option<String>,
    counter: u64,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty session named `Chat N` and make it active.
    pub fn create(&mut self) -> String {
        let name = loop {
            let Some(next) = self.counter.checked_add(1) else {
                break self.first_free_name();
            };
            self.counter = next;
            let candidate = format!("{}{}", GENERATED_PREFIX, next);
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        self.sessions.insert(name.clone(), Vec::new());
        self.active = Some(name.clone());
        debug!("Created session {}", name);
        name
    }

    /// Re-key a session, keeping its position and messages.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return if self.sessions.contains_key(old) {
                Ok(())
            } else {
                Err(Error::NotFound(old.to_string()))
            };
        }
        if new.trim().is_empty() {
            return Err(Error::Validation("chat name must not be empty".to_string()));
        }
        if !self.sessions.contains_key(old) {
            return Err(Error::NotFound(old.to_string()));
        }
        if self.sessions.contains_key(new) {
            return Err(Error::NameConflict(new.to_string()));
        }

        let Some((index, _, messages)) = self.sessions.shift_remove_full(old) else {
            return Err(Error::NotFound(old.to_string()));
        };
        self.sessions.shift_insert(index, new.to_string(), messages);

        if self.active.as_deref() == Some(old) {
            self.active = Some(new.to_string());
        }
        debug!("Renamed session {} -> {}", old, new);
        Ok(())
    }

    /// Remove a session. If it was active, the first remaining session
    /// becomes active.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if self.sessions.shift_remove(name).is_none() {
            return Err(Error::NotFound(name.to_string()));
        }

        if self.active.as_deref() == Some(name) {
            self.active = self.sessions.keys().next().cloned();
        }
        debug!("Deleted session {}", name);
        Ok(())
    }

    /// Append a message to the end of a session
    pub fn append(&mut self, name: &str, message: Message) -> Result<()> {
        let messages = self
            .sessions
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        messages.push(message);
        Ok(())
    }

    /// Make an existing session the active one
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        if !self.sessions.contains_key(name) {
            return Err(Error::NotFound(name.to_string()));
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    /// Name of the active session, if any
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Session names in store order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    /// Messages of a session
    pub fn messages(&self, name: &str) -> Option<&[Message]> {
        self.sessions.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Serialize all sessions as a JSON object of name -> messages
    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.sessions)?)
    }

    /// Serialize a single session in the same shape as [`serialize`](Self::serialize)
    pub fn export_one(&self, name: &str) -> Result<String> {
        let messages = self
            .sessions
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let mut single = IndexMap::new();
        single.insert(name, messages);
        Ok(serde_json::to_string_pretty(&single)?)
    }

    /// Parse serialized sessions, failing on malformed input.
    ///
    /// The first session becomes active.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let sessions: IndexMap<String, Vec<Message>> = serde_json::from_slice(bytes)?;
        let mut store = Self {
            active: sessions.keys().next().cloned(),
            sessions,
            counter: 0,
        };
        store.sync_counter();
        Ok(store)
    }

    /// Parse serialized sessions; malformed or empty input gives an empty store.
    pub fn deserialize(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Self::new();
        }
        Self::parse(bytes).unwrap_or_else(|e| {
            warn!("Discarding unreadable chat data: {}", e);
            Self::new()
        })
    }

    /// Merge sessions from another store. Sessions with the same name are
    /// replaced. Returns how many sessions were imported.
    pub fn import(&mut self, other: SessionStore) -> usize {
        let count = other.sessions.len();
        for (name, messages) in other.sessions {
            self.sessions.insert(name, messages);
        }
        self.sync_counter();
        if self.active.is_none() {
            self.active = self.sessions.keys().next().cloned();
        }
        count
    }

    /// Lowest `Chat N` not taken, used once the counter is exhausted
    fn first_free_name(&self) -> String {
        (1..=u64::MAX)
            .map(|n| format!("{}{}", GENERATED_PREFIX, n))
            .find(|candidate| !self.sessions.contains_key(candidate))
            .unwrap_or_else(|| GENERATED_PREFIX.trim_end().to_string())
    }

    /// Resume numbering after the highest `Chat N` already present
    fn sync_counter(&mut self) {
        let highest = self
            .sessions
            .keys()
            .filter_map(|name| name.strip_prefix(GENERATED_PREFIX))
            .filter_map(|suffix| suffix.trim().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        self.counter = self.counter.max(highest);
    }
}
