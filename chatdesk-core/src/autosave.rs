//! Best-effort transcript mirroring
//!
//! After every change to a chat, its full transcript can be copied to a
//! plain-text file in a user-chosen directory. This is a convenience backup;
//! the session file stays the source of truth, so failures here are logged
//! and never returned.

use crate::session::Message;
use crate::utils::{atomic_write, expand_tilde, safe_filename};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Render messages as `role: content` blocks separated by blank lines
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Writes per-chat transcript files when enabled
#[derive(Debug, Clone, Default)]
pub struct AutoSaveWriter {
    enabled: bool,
    directory: Option<PathBuf>,
}

impl AutoSaveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a writer from the `auto_save` / `save_directory` settings
    pub fn from_settings(enabled: bool, directory: &str) -> Self {
        let mut writer = Self::new();
        writer.configure(enabled, directory);
        writer
    }

    /// Turn mirroring on or off. An empty directory leaves it inert.
    pub fn configure(&mut self, enabled: bool, directory: &str) {
        self.enabled = enabled;
        self.directory = if enabled && !directory.trim().is_empty() {
            Some(expand_tilde(directory.trim()))
        } else {
            None
        };
    }

    /// True when updates will actually be written
    pub fn is_active(&self) -> bool {
        self.enabled && self.directory.is_some()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// File that holds the transcript of `session`
    pub fn path_for(&self, session: &str) -> Option<PathBuf> {
        self.directory
            .as_ref()
            .map(|dir| dir.join(format!("chat_{}.txt", safe_filename(session))))
    }

    /// Mirror a chat transcript. Returns the written path on success.
    pub fn on_update(&self, session: &str, transcript: &str) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        let path = self.path_for(session)?;

        match atomic_write(&path, transcript.as_bytes()) {
            Ok(()) => {
                debug!("Auto-saved chat to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Error auto-saving chat {}: {}", session, e);
                None
            }
        }
    }
}
