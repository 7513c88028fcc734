//! Model server integration for chatdesk
//!
//! Text generation against a local Ollama server, plus listing, installing
//! and removing models through the `ollama` command line.

pub mod base;
pub mod catalog;
pub mod ollama;
pub mod tool;

pub use base::{GenerateOptions, InferenceProvider, ProviderError, ProviderResult};
pub use catalog::{parse_model_list, ModelContext, ModelError, ModelManager};
pub use ollama::OllamaClient;
pub use tool::{ModelTool, OllamaCli, ToolError};
