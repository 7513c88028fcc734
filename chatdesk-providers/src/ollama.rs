//! Ollama HTTP client

use async_trait::async_trait;
use chatdesk_core::config::OllamaConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::base::{GenerateOptions, InferenceProvider, ProviderError, ProviderResult};
use crate::catalog::{ModelContext, ModelManager};

/// `/generate` request body
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerateOptions,
}

/// `/generate` response body; only `response` is used
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Client for a local Ollama server
pub struct OllamaClient {
    client: Client,
    base_url: String,
    timeout_secs: u64,
    options: GenerateOptions,
    models: ModelManager,
}

impl OllamaClient {
    /// Create a client. `models` is refreshed when the server reports a missing model.
    ///
    /// Fails if the HTTP client cannot be built with the configured timeout.
    pub fn new(config: &OllamaConfig, models: ModelManager) -> ProviderResult<Self> {
        let timeout_secs = config.timeout_secs;
        let client = Client::builder()
            .http1_only()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs,
            options: GenerateOptions::default(),
            models,
        })
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the server answers at all
    pub async fn check_server(&self) -> ProviderResult<()> {
        let url = format!("{}/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ServerError { status, body });
        }
        Ok(())
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            ProviderError::ConnectionFailed(self.base_url.clone())
        } else {
            ProviderError::HttpError(e)
        }
    }
}

#[async_trait]
impl InferenceProvider for OllamaClient {
    async fn generate(&self, ctx: &mut ModelContext, prompt: &str) -> ProviderResult<String> {
        let model = ctx.active_model().to_string();
        if model.trim().is_empty() {
            return Err(ProviderError::NoModelSelected);
        }

        let request = GenerateRequest {
            model: &model,
            prompt,
            stream: false,
            options: &self.options,
        };

        let url = format!("{}/generate", self.base_url);
        debug!("Sending generate request to {} with model {}", url, model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            warn!("Model {} not found on server, refreshing catalog", model);
            self.models.list_models(ctx).await;
            return Err(ProviderError::ModelNotFound(model));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ServerError {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout_secs)
            } else {
                ProviderError::InvalidResponse(e.to_string())
            }
        })?;

        body.response.ok_or_else(|| {
            ProviderError::InvalidResponse("missing 'response' field".to_string())
        })
    }
}
