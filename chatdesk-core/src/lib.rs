//! Core types for chatdesk
//!
//! This crate holds the state that outlives a single request: the session
//! store and its persistence file, user settings, the auto-save writer and
//! logging setup. It does not talk to the model server.

pub mod autosave;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod utils;

pub use error::{Error, Result};
