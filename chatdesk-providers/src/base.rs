//! Base trait for inference providers

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::catalog::ModelContext;

/// Error type for generation requests
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Could not connect to the model server at {0}. Make sure Ollama is running.")]
    ConnectionFailed(String),

    #[error("The model server did not answer within {0}s")]
    Timeout(u64),

    #[error("Model '{0}' not found. Install it with `chatdesk models pull {0}`.")]
    ModelNotFound(String),

    #[error("Server returned HTTP {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("No model selected")]
    NoModelSelected,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Sampling options sent with every generation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
        }
    }
}

/// Trait for text generation backends
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Generate a reply to `prompt` with the active model of `ctx`.
    ///
    /// Takes the context mutably because a missing model refreshes the catalog.
    async fn generate(&self, ctx: &mut ModelContext, prompt: &str) -> ProviderResult<String>;
}
