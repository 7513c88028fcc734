//! Installed-model catalog and model management

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::tool::{ModelTool, ToolError};

/// Error type for install/remove
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model name must not be empty")]
    EmptyName,

    #[error("Cannot remove '{0}' while it is the active model")]
    CannotRemoveActive(String),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Installed models and the model used for new prompts.
///
/// The catalog is never persisted; it is rebuilt from the model tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelContext {
    catalog: Vec<String>,
    active: String,
}

impl ModelContext {
    pub fn new(active: impl Into<String>) -> Self {
        Self {
            catalog: Vec::new(),
            active: active.into(),
        }
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    pub fn active_model(&self) -> &str {
        &self.active
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.catalog.iter().any(|m| m == name)
    }

    /// Select the model for new prompts.
    ///
    /// Accepted when the model is installed, or when the catalog is empty
    /// (nothing has been listed yet). Otherwise the selection is ignored and
    /// `false` is returned.
    pub fn set_active_model(&mut self, name: &str) -> bool {
        if self.catalog.is_empty() || self.is_installed(name) {
            self.active = name.to_string();
            true
        } else {
            warn!("Model '{}' is not installed; keeping '{}'", name, self.active);
            false
        }
    }

    pub(crate) fn replace_catalog(&mut self, models: Vec<String>) {
        self.catalog = models;
    }
}

/// Parse the table printed by `ollama list`.
///
/// The header line is skipped; each remaining line contributes its first
/// column with any `:tag` removed.
pub fn parse_model_list(output: &str) -> Vec<String> {
    let mut models: Vec<String> = Vec::new();
    for line in output.lines().skip(1) {
        let Some(first) = line.split_whitespace().next() else {
            continue;
        };
        let name = first.split(':').next().unwrap_or(first);
        if !name.is_empty() && !models.iter().any(|m| m == name) {
            models.push(name.to_string());
        }
    }
    models
}

/// Runs the model tool and keeps a [`ModelContext`] catalog in sync
#[derive(Clone)]
pub struct ModelManager {
    tool: Arc<dyn ModelTool>,
}

impl ModelManager {
    pub fn new(tool: Arc<dyn ModelTool>) -> Self {
        Self { tool }
    }

    /// Re-list installed models into `ctx`. On failure the catalog is left as is.
    pub async fn refresh(&self, ctx: &mut ModelContext) -> Result<(), ToolError> {
        let output = self.tool.list().await?;
        ctx.replace_catalog(parse_model_list(&output));
        Ok(())
    }

    /// Installed models, falling back to the cached catalog when listing fails
    pub async fn list_models(&self, ctx: &mut ModelContext) -> Vec<String> {
        if let Err(e) = self.refresh(ctx).await {
            warn!("Could not list models, using cached catalog: {}", e);
        }
        ctx.catalog().to_vec()
    }

    /// Download a model, then refresh the catalog whatever the outcome
    pub async fn install_model(&self, ctx: &mut ModelContext, name: &str) -> Result<(), ModelError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ModelError::EmptyName);
        }

        info!("Installing model {}", name);
        let result = self.tool.pull(name).await;
        self.list_models(ctx).await;
        result.map_err(ModelError::from)
    }

    /// Delete a model, then refresh the catalog whatever the outcome.
    ///
    /// The active model is refused before the tool is run.
    pub async fn remove_model(&self, ctx: &mut ModelContext, name: &str) -> Result<(), ModelError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ModelError::EmptyName);
        }
        if name == ctx.active_model() {
            return Err(ModelError::CannotRemoveActive(name.to_string()));
        }

        info!("Removing model {}", name);
        let result = self.tool.remove(name).await;
        self.list_models(ctx).await;
        result.map_err(ModelError::from)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeTool;
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_parse_model_list() {
        let output = "NAME                    ID              SIZE      MODIFIED\n\
                      llama2-uncensored:latest  44040b922233  3.8 GB  2 weeks ago\n\
                      \n\
                      mistral:7b              61e88e884507    4.1 GB    3 days ago\n\
                      mistral:latest          61e88e884507    4.1 GB    3 days ago\n";
        assert_eq!(
            parse_model_list(output),
            vec!["llama2-uncensored".to_string(), "mistral".to_string()]
        );
        assert!(parse_model_list("NAME ID SIZE MODIFIED\n").is_empty());
        assert!(parse_model_list("").is_empty());
    }

    #[test]
    fn test_set_active_model_bootstrap_and_validation() {
        let mut ctx = ModelContext::new("llama2");
        // Empty catalog accepts anything.
        assert!(ctx.set_active_model("whatever"));
        assert_eq!(ctx.active_model(), "whatever");

        ctx.replace_catalog(vec!["llama2".to_string(), "mistral".to_string()]);
        assert!(ctx.set_active_model("mistral"));
        assert!(!ctx.set_active_model("phi"));
        assert_eq!(ctx.active_model(), "mistral");
    }

    #[tokio::test]
    async fn test_list_models_updates_catalog() {
        let tool = Arc::new(FakeTool::with_models(&["llama2", "mistral"]));
        let manager = ModelManager::new(tool.clone());
        let mut ctx = ModelContext::new("llama2");

        let models = manager.list_models(&mut ctx).await;
        assert_eq!(models, vec!["llama2".to_string(), "mistral".to_string()]);
        assert_eq!(ctx.catalog(), models.as_slice());
        assert_eq!(tool.lists(), 1);
    }

    #[tokio::test]
    async fn test_list_failure_keeps_cached_catalog() {
        let tool = Arc::new(FakeTool {
            fail_list: true,
            ..Default::default()
        });
        let manager = ModelManager::new(tool);
        let mut ctx = ModelContext::new("llama2");
        ctx.replace_catalog(vec!["llama2".to_string()]);

        let models = manager.list_models(&mut ctx).await;
        assert_eq!(models, vec!["llama2".to_string()]);
        assert!(manager.refresh(&mut ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_active_model_never_runs_tool() {
        let tool = Arc::new(FakeTool::with_models(&["llama2"]));
        let manager = ModelManager::new(tool.clone());
        let mut ctx = ModelContext::new("llama2");

        let err = manager.remove_model(&mut ctx, "llama2").await.unwrap_err();
        assert!(matches!(err, ModelError::CannotRemoveActive(ref name) if name == "llama2"));
        assert_eq!(tool.remove_calls.load(Ordering::SeqCst), 0);
        assert_eq!(tool.lists(), 0);
    }

    #[tokio::test]
    async fn test_install_and_remove_refresh_catalog() {
        let tool = Arc::new(FakeTool::with_models(&["llama2"]));
        let manager = ModelManager::new(tool.clone());
        let mut ctx = ModelContext::new("llama2");

        manager.install_model(&mut ctx, "mistral").await.unwrap();
        assert!(ctx.is_installed("mistral"));

        manager.remove_model(&mut ctx, "mistral").await.unwrap();
        assert!(!ctx.is_installed("mistral"));
        assert_eq!(tool.lists(), 2);
    }

    #[tokio::test]
    async fn test_failed_install_still_refreshes() {
        let tool = Arc::new(FakeTool {
            fail_pull: true,
            ..FakeTool::with_models(&["llama2"])
        });
        let manager = ModelManager::new(tool.clone());
        let mut ctx = ModelContext::new("llama2");

        let err = manager.install_model(&mut ctx, "mistral").await.unwrap_err();
        assert!(matches!(err, ModelError::Tool(_)));
        assert_eq!(tool.lists(), 1);
        assert_eq!(ctx.catalog(), &["llama2".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let tool = Arc::new(FakeTool::default());
        let manager = ModelManager::new(tool.clone());
        let mut ctx = ModelContext::new("llama2");

        assert!(matches!(
            manager.install_model(&mut ctx, "  ").await,
            Err(ModelError::EmptyName)
        ));
        assert_eq!(tool.pull_calls.load(Ordering::SeqCst), 0);
    }
}
