//! External model management tool

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Error type for model tool invocations
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' timed out after {1}s")]
    Timeout(String, u64),

    #[error("'{command}' exited with code {code}: {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },
}

/// The program that lists, installs and removes local models
#[async_trait]
pub trait ModelTool: Send + Sync {
    /// Raw output of `list`
    async fn list(&self) -> Result<String, ToolError>;

    /// Download a model. Completes when the download does.
    async fn pull(&self, name: &str) -> Result<(), ToolError>;

    /// Delete a local model
    async fn remove(&self, name: &str) -> Result<(), ToolError>;
}

/// `ollama` command line
pub struct OllamaCli {
    program: String,
    list_timeout_secs: u64,
}

impl OllamaCli {
    pub fn new(program: impl Into<String>, list_timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            list_timeout_secs,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, args: &[&str], limit: Option<Duration>) -> Result<String, ToolError> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!("Running {}", command);

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = match limit {
            Some(limit) => timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| ToolError::Timeout(command.clone(), limit.as_secs()))?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| ToolError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                command,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ModelTool for OllamaCli {
    async fn list(&self) -> Result<String, ToolError> {
        let limit = Duration::from_secs(self.list_timeout_secs);
        self.run(&["list"], Some(limit)).await
    }

    async fn pull(&self, name: &str) -> Result<(), ToolError> {
        self.run(&["pull", name], None).await.map(|_| ())
    }

    async fn remove(&self, name: &str) -> Result<(), ToolError> {
        self.run(&["rm", name], None).await.map(|_| ())
    }
}
