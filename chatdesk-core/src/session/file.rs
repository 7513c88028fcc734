//! On-disk persistence for the session store

use super::manager::SessionStore;
use crate::utils::atomic_write;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name used for the session store inside the data directory
pub const SESSIONS_FILE: &str = "chats.json";

/// Sibling file holding the name of the active chat
pub const ACTIVE_FILE: &str = "active_chat";

/// The JSON file holding every chat
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The session file inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(SESSIONS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn active_path(&self) -> PathBuf {
        self.path.with_file_name(ACTIVE_FILE)
    }

    /// Make the chat recorded by the last save active again, if it still exists
    fn restore_active(&self, store: &mut SessionStore) {
        let Ok(name) = std::fs::read_to_string(self.active_path()) else {
            return;
        };
        let name = name.trim_end_matches('\n');
        if !name.is_empty() && store.set_active(name).is_err() {
            debug!("Recorded active chat {} no longer exists", name);
        }
    }

    /// Load the store. A missing or unreadable file means no chats yet.
    ///
    /// A file that cannot be parsed is moved aside to
    /// `chats.json.corrupt-<timestamp>` so the next save cannot overwrite it.
    pub fn load(&self) -> SessionStore {
        if !self.path.exists() {
            debug!("No session file at {}", self.path.display());
            return SessionStore::new();
        }

        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                return SessionStore::new();
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return SessionStore::new();
        }

        match SessionStore::parse(&bytes) {
            Ok(mut store) => {
                self.restore_active(&mut store);
                store
            }
            Err(e) => {
                warn!("Unreadable chat data in {}: {}", self.path.display(), e);
                self.quarantine();
                SessionStore::new()
            }
        }
    }

    fn quarantine(&self) {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let mut target = self.path.as_os_str().to_owned();
        target.push(format!(".corrupt-{}", stamp));
        let target = PathBuf::from(target);

        match std::fs::rename(&self.path, &target) {
            Ok(()) => {
                warn!("Moved unreadable chat data to {}", target.display())
            }
            Err(e) => warn!("Failed to move {} aside: {}", self.path.display(), e),
        }
    }

    /// Write the whole store, replacing the previous file atomically.
    /// The active chat name goes to a sibling file.
    pub fn save(&self, store: &SessionStore) -> crate::Result<()> {
        let content = store.serialize()?;
        atomic_write(&self.path, content.as_bytes())?;
        atomic_write(self.active_path(), store.active().unwrap_or_default().as_bytes())?;
        debug!("Saved {} chats to {}", store.len(), self.path.display());
        Ok(())
    }
}
