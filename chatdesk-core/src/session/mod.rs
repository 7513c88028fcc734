//! Chat sessions
//!
//! Sessions are kept in one ordered in-memory store and persisted as a
//! single JSON object mapping chat name to its messages.

pub mod file;
pub mod manager;
pub mod store;

pub use file::{SessionFile, ACTIVE_FILE, SESSIONS_FILE};
pub use manager::SessionStore;
pub use store::{Message, Role};
