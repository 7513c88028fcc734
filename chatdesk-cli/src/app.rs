//! Chat application state shared by every command

use chatdesk_core::autosave::{render_transcript, AutoSaveWriter};
use chatdesk_core::config::{set_key, validate_settings, Settings, SettingsLoader};
use chatdesk_core::session::{Message, SessionFile, SessionStore};
use chatdesk_core::utils::atomic_write;
use chatdesk_providers::{
    InferenceProvider, ModelContext, ModelError, ModelManager, OllamaCli, OllamaClient,
    ProviderError,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors shown to the user by chat commands
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No active chat. Start one with /new or `chatdesk sessions new`.")]
    NoActiveSession,

    #[error("Model '{0}' is not installed. See `chatdesk models list`.")]
    ModelNotInstalled(String),

    #[error(transparent)]
    Store(#[from] chatdesk_core::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type AppResult<T> = Result<T, AppError>;

/// Settings, chats and the model server, wired together
pub struct ChatApp {
    loader: SettingsLoader,
    settings: Settings,
    store: SessionStore,
    file: SessionFile,
    autosave: AutoSaveWriter,
    models: ModelManager,
    model_ctx: ModelContext,
    provider: Arc<dyn InferenceProvider>,
}

impl ChatApp {
    /// Open the app against the configured Ollama server and tool
    pub fn open(loader: SettingsLoader, settings: Settings) -> AppResult<Self> {
        let tool = Arc::new(OllamaCli::new(
            settings.ollama.program.clone(),
            settings.ollama.list_timeout_secs,
        ));
        let models = ModelManager::new(tool);
        let provider = Arc::new(OllamaClient::new(&settings.ollama, models.clone())?);
        Ok(Self::with_parts(loader, settings, models, provider))
    }

    /// Open the app with explicit model management and generation backends
    pub fn with_parts(
        loader: SettingsLoader,
        settings: Settings,
        models: ModelManager,
        provider: Arc<dyn InferenceProvider>,
    ) -> Self {
        let file = SessionFile::in_dir(loader.config_dir());
        let store = file.load();
        info!("Loaded {} chats from {}", store.len(), file.path().display());

        Self {
            autosave: AutoSaveWriter::from_settings(settings.auto_save, &settings.save_directory),
            model_ctx: ModelContext::new(settings.model.clone()),
            loader,
            settings,
            store,
            file,
            models,
            provider,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn session_file(&self) -> &Path {
        self.file.path()
    }

    pub fn model_context(&self) -> &ModelContext {
        &self.model_ctx
    }

    pub fn active_session(&self) -> Option<&str> {
        self.store.active()
    }

    /// Send a prompt in the active chat and record the reply.
    ///
    /// Blank prompts are ignored and return `Ok(None)`. When generation fails
    /// the user message stays in the chat and the error is returned.
    pub async fn submit(&mut self, prompt: &str) -> AppResult<Option<String>> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Ok(None);
        }

        let session = self
            .store
            .active()
            .map(str::to_string)
            .ok_or(AppError::NoActiveSession)?;

        self.store.append(&session, Message::user(prompt))?;
        self.after_update(&session);

        debug!("Generating reply in {} with {}", session, self.model_ctx.active_model());
        let reply = self.provider.generate(&mut self.model_ctx, prompt).await?;

        self.store.append(&session, Message::assistant(reply.clone()))?;
        self.after_update(&session);
        Ok(Some(reply))
    }

    fn after_update(&self, session: &str) {
        if let Some(messages) = self.store.messages(session) {
            self.autosave.on_update(session, &render_transcript(messages));
        }
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.file.save(&self.store) {
            warn!("Failed to save chats to {}: {}", self.file.path().display(), e);
        }
    }

    /// Create and activate a new chat
    pub fn new_session(&mut self) -> String {
        let name = self.store.create();
        info!("Created chat {}", name);
        self.persist();
        name
    }

    /// The active chat, creating one if there is none
    pub fn ensure_session(&mut self) -> String {
        match self.store.active() {
            Some(name) => name.to_string(),
            None => self.new_session(),
        }
    }

    pub fn rename_session(&mut self, old: &str, new: &str) -> AppResult<()> {
        self.store.rename(old, new.trim())?;
        info!("Renamed chat {} to {}", old, new.trim());
        self.persist();
        Ok(())
    }

    pub fn delete_session(&mut self, name: &str) -> AppResult<()> {
        self.store.delete(name)?;
        info!("Deleted chat {}", name);
        self.persist();
        Ok(())
    }

    pub fn switch_session(&mut self, name: &str) -> AppResult<()> {
        self.store.set_active(name)?;
        self.persist();
        Ok(())
    }

    /// Merge chats from an exported file. Returns how many were imported.
    pub fn import_file(&mut self, path: &Path) -> AppResult<usize> {
        let bytes = std::fs::read(path).map_err(chatdesk_core::Error::from)?;
        let imported = SessionStore::parse(&bytes)?;
        let count = self.store.import(imported);
        info!("Imported {} chats from {}", count, path.display());
        self.persist();
        Ok(count)
    }

    /// Write one chat, or all of them, in the session file format
    pub fn export_file(&self, name: Option<&str>, path: &Path) -> AppResult<()> {
        let content = match name {
            Some(name) => self.store.export_one(name)?,
            None => self.store.serialize()?,
        };
        atomic_write(path, content.as_bytes()).map_err(chatdesk_core::Error::from)?;
        info!("Exported chats to {}", path.display());
        Ok(())
    }

    /// Installed models; the cached list when the tool is unavailable
    pub async fn list_models(&mut self) -> Vec<String> {
        self.models.list_models(&mut self.model_ctx).await
    }

    pub async fn install_model(&mut self, name: &str) -> AppResult<()> {
        self.models.install_model(&mut self.model_ctx, name).await?;
        Ok(())
    }

    pub async fn remove_model(&mut self, name: &str) -> AppResult<()> {
        self.models.remove_model(&mut self.model_ctx, name).await?;
        Ok(())
    }

    /// Use `name` for this run only
    pub fn override_model(&mut self, name: &str) -> bool {
        self.model_ctx.set_active_model(name)
    }

    /// Select and save the default model. Returns `false` if it is not installed.
    pub async fn select_model(&mut self, name: &str) -> AppResult<bool> {
        self.list_models().await;
        if !self.model_ctx.set_active_model(name) {
            return Ok(false);
        }
        let mut settings = self.settings.clone();
        settings.model = name.to_string();
        self.apply_settings(settings)?;
        Ok(true)
    }

    /// Set one dotted key and save. A new model name is checked against a
    /// freshly listed catalog.
    pub async fn set_setting(&mut self, key: &str, raw: &str) -> AppResult<()> {
        let updated = set_key(&self.settings, key, raw)?;
        if updated.model != self.settings.model {
            self.list_models().await;
            if !self.model_ctx.set_active_model(&updated.model) {
                return Err(AppError::ModelNotInstalled(updated.model));
            }
        }
        self.apply_settings(updated)
    }

    /// Validate, apply and save new settings
    pub fn apply_settings(&mut self, mut settings: Settings) -> AppResult<()> {
        validate_settings(&settings)?;

        if settings.model != self.model_ctx.active_model()
            && !self.model_ctx.set_active_model(&settings.model)
        {
            settings.model = self.model_ctx.active_model().to_string();
        }

        self.loader.save(&settings)?;
        self.autosave.configure(settings.auto_save, &settings.save_directory);
        self.settings = settings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatdesk_core::session::Role;
    use chatdesk_providers::{ModelTool, ProviderResult, ToolError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeProvider {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InferenceProvider for FakeProvider {
        async fn generate(&self, ctx: &mut ModelContext, prompt: &str) -> ProviderResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::ConnectionFailed(
                    "http://localhost:11434/api".to_string(),
                ));
            }
            Ok(format!("[{}] {}", ctx.active_model(), prompt.to_uppercase()))
        }
    }

    struct FakeTool {
        installed: Mutex<Vec<String>>,
    }

    impl FakeTool {
        fn new(models: &[&str]) -> Self {
            Self {
                installed: Mutex::new(models.iter().map(|m| m.to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl ModelTool for FakeTool {
        async fn list(&self) -> Result<String, ToolError> {
            let mut out = String::from("NAME ID SIZE MODIFIED\n");
            for model in self.installed.lock().unwrap().iter() {
                out.push_str(&format!("{}:latest 123 1 GB now\n", model));
            }
            Ok(out)
        }

        async fn pull(&self, name: &str) -> Result<(), ToolError> {
            self.installed.lock().unwrap().push(name.to_string());
            Ok(())
        }

        async fn remove(&self, name: &str) -> Result<(), ToolError> {
            self.installed.lock().unwrap().retain(|m| m != name);
            Ok(())
        }
    }

    fn app_in(dir: &Path, provider: Arc<FakeProvider>, settings: Settings) -> ChatApp {
        let loader = SettingsLoader::with_dir(dir);
        let models = ModelManager::new(Arc::new(FakeTool::new(&["llama2-uncensored", "mistral"])));
        ChatApp::with_parts(loader, settings, models, provider)
    }

    #[tokio::test]
    async fn test_submit_records_exchange_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let mut app = app_in(temp_dir.path(), provider.clone(), Settings::default());

        let name = app.new_session();
        let reply = app.submit("  hello  ").await.unwrap();
        assert_eq!(reply.as_deref(), Some("[llama2-uncensored] HELLO"));

        let messages = app.store().messages(&name).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, Role::Assistant);

        // A fresh app sees the same chats.
        let reopened = app_in(temp_dir.path(), provider, Settings::default());
        assert_eq!(reopened.store(), app.store());
    }

    #[tokio::test]
    async fn test_failed_generation_keeps_user_message() {
        let temp_dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider {
            fail: true,
            ..Default::default()
        });
        let mut app = app_in(temp_dir.path(), provider.clone(), Settings::default());
        let name = app.new_session();

        let err = app.submit("hello").await.unwrap_err();
        assert!(matches!(err, AppError::Provider(ProviderError::ConnectionFailed(_))));

        let messages = app.store().messages(&name).unwrap();
        assert_eq!(messages, &[Message::user("hello")]);
        let reopened = app_in(temp_dir.path(), provider, Settings::default());
        assert_eq!(reopened.store().messages(&name).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_prompt_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let mut app = app_in(temp_dir.path(), provider.clone(), Settings::default());
        let name = app.new_session();

        assert_eq!(app.submit("   \n").await.unwrap(), None);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(app.store().messages(&name).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_without_session_fails() {
        let temp_dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let mut app = app_in(temp_dir.path(), provider.clone(), Settings::default());

        let err = app.submit("hello").await.unwrap_err();
        assert!(matches!(err, AppError::NoActiveSession));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_mirrors_transcript() {
        let temp_dir = TempDir::new().unwrap();
        let backups = temp_dir.path().join("backups");
        let settings = Settings {
            save_directory: backups.to_string_lossy().into_owned(),
            ..Default::default()
        };
        let mut app = app_in(temp_dir.path(), Arc::new(FakeProvider::default()), settings);
        app.new_session();

        app.submit("hi").await.unwrap();
        let transcript = std::fs::read_to_string(backups.join("chat_Chat%201.txt")).unwrap();
        assert_eq!(transcript, "user: hi\n\nassistant: [llama2-uncensored] HI");
    }

    #[test]
    fn test_session_operations_persist() {
        let temp_dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let mut app = app_in(temp_dir.path(), provider.clone(), Settings::default());

        assert_eq!(app.new_session(), "Chat 1");
        assert_eq!(app.new_session(), "Chat 2");
        app.rename_session("Chat 1", "Ideas").unwrap();
        app.switch_session("Ideas").unwrap();
        app.delete_session("Chat 2").unwrap();

        let err = app.rename_session("Ideas", "  ").unwrap_err();
        assert!(matches!(err, AppError::Store(chatdesk_core::Error::Validation(_))));

        let reopened = app_in(temp_dir.path(), provider, Settings::default());
        let names: Vec<&str> = reopened.store().names().collect();
        assert_eq!(names, vec!["Ideas"]);
        assert_eq!(reopened.active_session(), Some("Ideas"));
    }

    #[tokio::test]
    async fn test_new_chat_stays_active_after_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let provider = Arc::new(FakeProvider::default());
        let mut app = app_in(temp_dir.path(), provider.clone(), Settings::default());
        app.new_session();
        app.new_session();

        let mut reopened = app_in(temp_dir.path(), provider.clone(), Settings::default());
        assert_eq!(reopened.active_session(), Some("Chat 2"));
        reopened.submit("hi").await.unwrap();
        assert!(reopened.store().messages("Chat 1").unwrap().is_empty());
        assert_eq!(reopened.store().messages("Chat 2").unwrap().len(), 2);

        reopened.switch_session("Chat 1").unwrap();
        let again = app_in(temp_dir.path(), provider, Settings::default());
        assert_eq!(again.active_session(), Some("Chat 1"));
    }

    #[test]
    fn test_rename_conflict_leaves_store_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(temp_dir.path(), Arc::default(), Settings::default());
        app.new_session();
        app.new_session();
        let before = app.store().clone();

        let err = app.rename_session("Chat 1", "Chat 2").unwrap_err();
        assert!(matches!(err, AppError::Store(chatdesk_core::Error::NameConflict(_))));
        assert_eq!(app.store(), &before);
    }

    #[tokio::test]
    async fn test_export_then_import_into_other_app() {
        let source_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();
        let export_path = source_dir.path().join("export").join("chat.json");

        let mut source = app_in(source_dir.path(), Arc::default(), Settings::default());
        source.new_session();
        source.submit("one").await.unwrap();
        source.new_session();
        source.export_file(Some("Chat 1"), &export_path).unwrap();

        let mut target = app_in(target_dir.path(), Arc::default(), Settings::default());
        assert_eq!(target.import_file(&export_path).unwrap(), 1);
        assert_eq!(target.active_session(), Some("Chat 1"));
        assert_eq!(target.store().messages("Chat 1").unwrap().len(), 2);
        // Numbering continues after imported chats.
        assert_eq!(target.new_session(), "Chat 2");

        let err = source.export_file(Some("Nope"), &export_path).unwrap_err();
        assert!(matches!(err, AppError::Store(chatdesk_core::Error::NotFound(_))));
    }

    #[test]
    fn test_import_rejects_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let bad = temp_dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();

        let mut app = app_in(temp_dir.path(), Arc::default(), Settings::default());
        assert!(app.import_file(&bad).is_err());
        assert!(app.store().is_empty());
    }

    #[tokio::test]
    async fn test_select_model_validates_and_saves() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(temp_dir.path(), Arc::default(), Settings::default());

        assert!(app.select_model("mistral").await.unwrap());
        assert_eq!(app.model_context().active_model(), "mistral");
        assert!(!app.select_model("phi").await.unwrap());
        assert_eq!(app.settings().model, "mistral");

        let saved = SettingsLoader::with_dir(temp_dir.path()).load().unwrap();
        assert_eq!(saved.model, "mistral");
    }

    #[tokio::test]
    async fn test_set_setting_checks_model_against_fresh_catalog() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(temp_dir.path(), Arc::default(), Settings::default());

        let err = app.set_setting("model", "phi").await.unwrap_err();
        assert!(matches!(err, AppError::ModelNotInstalled(ref name) if name == "phi"));
        assert_eq!(app.settings().model, "llama2-uncensored");
        assert!(!SettingsLoader::with_dir(temp_dir.path()).settings_path().exists());

        app.set_setting("model", "mistral").await.unwrap();
        assert_eq!(app.model_context().active_model(), "mistral");
        app.set_setting("font_size", "14").await.unwrap();

        let saved = SettingsLoader::with_dir(temp_dir.path()).load().unwrap();
        assert_eq!(saved.model, "mistral");
        assert_eq!(saved.font_size, 14);
    }

    #[tokio::test]
    async fn test_model_management() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(temp_dir.path(), Arc::default(), Settings::default());

        app.install_model("phi").await.unwrap();
        assert!(app.model_context().is_installed("phi"));

        let err = app.remove_model("llama2-uncensored").await.unwrap_err();
        assert!(matches!(err, AppError::Model(ModelError::CannotRemoveActive(_))));

        app.remove_model("phi").await.unwrap();
        assert_eq!(
            app.list_models().await,
            vec!["llama2-uncensored".to_string(), "mistral".to_string()]
        );
    }

    #[test]
    fn test_apply_settings_rejects_invalid_and_reconfigures() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(temp_dir.path(), Arc::default(), Settings::default());

        let invalid = Settings {
            font_size: 99,
            ..Default::default()
        };
        assert!(app.apply_settings(invalid).is_err());
        assert_eq!(app.settings().font_size, 12);

        let updated = Settings {
            dark_mode: true,
            auto_save: false,
            ..Default::default()
        };
        app.apply_settings(updated.clone()).unwrap();
        assert_eq!(app.settings(), &updated);
        assert!(SettingsLoader::with_dir(temp_dir.path()).settings_path().exists());
    }
}
