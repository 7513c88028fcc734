//! CLI entry point for chatdesk

mod app;
mod repl;

use anyhow::Result;
use app::ChatApp;
use chatdesk_core::config::{Settings, SettingsLoader};
use chatdesk_core::logging::init_logging;
use chatdesk_core::utils::truncate;
use chatdesk_providers::{ModelManager, OllamaCli, OllamaClient};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "chatdesk")]
#[command(about = "Chat with local models served by Ollama")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration directory (default: ~/.chatdesk)
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat (default)
    Chat {
        /// Chat to open
        #[arg(short, long)]
        session: Option<String>,
        /// Model to use for this run
        #[arg(long)]
        model: Option<String>,
    },
    /// Send one message and print the reply
    Send {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Chat to send it in (default: the first chat, or a new one)
        #[arg(short, long)]
        session: Option<String>,
        /// Model to use for this run
        #[arg(long)]
        model: Option<String>,
    },
    /// Manage chats
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Manage local models
    Models {
        #[command(subcommand)]
        command: ModelCommands,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Show status information
    Status,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List chats
    List,
    /// Create a new chat
    New,
    /// Rename a chat
    Rename { old: String, new: String },
    /// Delete a chat
    Delete {
        name: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Print a chat
    Show { name: Option<String> },
    /// Import chats from an exported file
    Import { path: PathBuf },
    /// Export one chat, or all chats
    Export {
        /// Chat to export (default: all)
        #[arg(short, long)]
        name: Option<String>,
        /// Output file (default: chatdesk-export-<timestamp>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    /// List installed models
    List,
    /// Download a model
    Pull {
        name: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete a model
    Rm {
        name: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Set the default model
    Use { name: String },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print current settings
    Show,
    /// Set one value, e.g. `ollama.timeout_secs 60`
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = if let Some(dir) = cli.config_dir {
        SettingsLoader::with_dir(dir)
    } else {
        SettingsLoader::new()
    };
    let (settings, load_error) = loader.load_or_default();

    let log_dir = loader.log_dir(&settings);
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory {}: {}", log_dir.display(), e);
    }
    let _guard = init_logging(&settings.logging, &log_dir);
    info!("Using config directory {}", loader.config_dir().display());
    if let Some(e) = load_error {
        warn!(
            "Ignoring {} and using defaults: {}",
            loader.settings_path().display(),
            e
        );
    }

    let command = cli.command.unwrap_or(Commands::Chat {
        session: None,
        model: None,
    });

    match command {
        Commands::Chat { session, model } => {
            info!("Starting chat");
            run_chat(loader, settings, session, model).await?;
        }
        Commands::Send {
            message,
            session,
            model,
        } => {
            info!("Sending one message");
            run_send(loader, settings, &message, session, model).await?;
        }
        Commands::Sessions { command } => {
            let mut app = ChatApp::open(loader, settings)?;
            run_sessions(&mut app, command)?;
        }
        Commands::Models { command } => {
            let mut app = ChatApp::open(loader, settings)?;
            run_models(&mut app, command).await?;
        }
        Commands::Settings { command } => {
            run_settings(loader, settings, command).await?;
        }
        Commands::Status => {
            run_status(loader, settings).await?;
        }
    }

    Ok(())
}

fn open_with_overrides(
    loader: SettingsLoader,
    settings: Settings,
    session: Option<String>,
    model: Option<String>,
) -> Result<ChatApp> {
    let mut app = ChatApp::open(loader, settings)?;
    if let Some(name) = session {
        app.switch_session(&name)?;
    }
    if let Some(model) = model {
        app.override_model(&model);
    }
    Ok(app)
}

async fn run_chat(
    loader: SettingsLoader,
    settings: Settings,
    session: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let mut app = open_with_overrides(loader, settings, session, model)?;
    repl::run(&mut app).await
}

async fn run_send(
    loader: SettingsLoader,
    settings: Settings,
    message: &str,
    session: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let mut app = open_with_overrides(loader, settings, session, model)?;
    let session = app.ensure_session();

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Asking {}...", app.model_context().active_model()));
    pb.enable_steady_tick(Duration::from_millis(100));
    let result = app.submit(message).await;
    pb.finish_and_clear();

    match result {
        Ok(Some(reply)) => {
            println!("{}", reply);
            Ok(())
        }
        Ok(None) => {
            println!("Nothing to send.");
            Ok(())
        }
        Err(e) => {
            error!("Error in {}: {}", session, e);
            anyhow::bail!("{}", e);
        }
    }
}

fn run_sessions(app: &mut ChatApp, command: SessionCommands) -> Result<()> {
    match command {
        SessionCommands::List => {
            if app.store().is_empty() {
                println!("No chats yet.");
                return Ok(());
            }
            println!("{}", style("Chats").bold().cyan());
            for name in app.store().names() {
                let messages = app.store().messages(name).unwrap_or_default();
                let preview = messages
                    .last()
                    .map(|m| truncate(&m.content.replace('\n', " "), 50))
                    .unwrap_or_default();
                println!(
                    "  {} {} {}",
                    style(name).bold(),
                    style(format!("({} messages)", messages.len())).dim(),
                    preview
                );
            }
        }
        SessionCommands::New => {
            let name = app.new_session();
            println!("{} Created {}", style("✓").green().bold(), name);
        }
        SessionCommands::Rename { old, new } => {
            app.rename_session(&old, &new)?;
            println!("{} Renamed {} to {}", style("✓").green().bold(), old, new.trim());
        }
        SessionCommands::Delete { name, yes } => {
            if !app.store().contains(&name) {
                anyhow::bail!("Chat '{}' not found", name);
            }
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete '{}'?", name))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            app.delete_session(&name)?;
            println!("{} Deleted {}", style("✓").green().bold(), name);
        }
        SessionCommands::Show { name } => {
            let name = match name.or_else(|| app.active_session().map(str::to_string)) {
                Some(name) => name,
                None => {
                    println!("No chats yet.");
                    return Ok(());
                }
            };
            let messages = app
                .store()
                .messages(&name)
                .ok_or_else(|| anyhow::anyhow!("Chat '{}' not found", name))?;
            println!("{}", style(&name).bold().cyan());
            for message in messages {
                println!("{} {}\n", style(format!("{}:", message.role.label())).bold(), message.content);
            }
        }
        SessionCommands::Import { path } => {
            let count = app.import_file(&path)?;
            println!(
                "{} Imported {} chats from {}",
                style("✓").green().bold(),
                count,
                path.display()
            );
        }
        SessionCommands::Export { name, output } => {
            let output = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "chatdesk-export-{}.json",
                    chrono::Local::now().format("%Y%m%d-%H%M%S")
                ))
            });
            app.export_file(name.as_deref(), &output)?;
            println!("{} Exported to {}", style("✓").green().bold(), output.display());
        }
    }
    Ok(())
}

async fn run_models(app: &mut ChatApp, command: ModelCommands) -> Result<()> {
    match command {
        ModelCommands::List => {
            let models = app.list_models().await;
            if models.is_empty() {
                println!("No models found. Is Ollama installed?");
                return Ok(());
            }
            let active = app.model_context().active_model();
            println!("{}", style("Installed models").bold().cyan());
            for model in &models {
                if model == active {
                    println!("  {} {}", style(model).green().bold(), style("(active)").dim());
                } else {
                    println!("  {}", model);
                }
            }
        }
        ModelCommands::Pull { name, yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Download '{}'? This may take a while.", name))
                    .default(true)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
            );
            pb.set_message(format!("Downloading {}", name));
            pb.enable_steady_tick(Duration::from_millis(100));
            let result = app.install_model(&name).await;
            pb.finish_and_clear();

            result?;
            println!("{} Installed {}", style("✓").green().bold(), name);
        }
        ModelCommands::Rm { name, yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Remove '{}'?", name))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            app.remove_model(&name).await?;
            println!("{} Removed {}", style("✓").green().bold(), name);
        }
        ModelCommands::Use { name } => {
            if app.select_model(&name).await? {
                println!("{} Default model is now {}", style("✓").green().bold(), name);
            } else {
                println!(
                    "{} Model '{}' is not installed. Run `chatdesk models pull {}` first.",
                    style("✗").red(),
                    name,
                    name
                );
            }
        }
    }
    Ok(())
}

async fn run_settings(
    loader: SettingsLoader,
    settings: Settings,
    command: SettingsCommands,
) -> Result<()> {
    match command {
        SettingsCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsCommands::Set { key, value } => {
            let mut app = ChatApp::open(loader, settings)?;
            app.set_setting(&key, &value).await?;
            println!("{} {} = {}", style("✓").green().bold(), key, value);
        }
    }
    Ok(())
}

async fn run_status(loader: SettingsLoader, settings: Settings) -> Result<()> {
    println!("{}", style("chatdesk status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config directory: {}", loader.config_dir().display());
    println!("  Settings file: {}", loader.settings_path().display());
    println!("  Log directory: {}", loader.log_dir(&settings).display());
    let autosave = if settings.auto_save && !settings.save_directory.trim().is_empty() {
        style(settings.save_directory.clone()).green()
    } else {
        style("off".to_string()).dim()
    };
    println!("  Auto-save: {}", autosave);
    println!();

    let tool = Arc::new(OllamaCli::new(
        settings.ollama.program.clone(),
        settings.ollama.list_timeout_secs,
    ));
    let client = OllamaClient::new(&settings.ollama, ModelManager::new(tool))?;
    println!("{}", style("Model server:").bold());
    println!("  Endpoint: {}", client.base_url());
    match client.check_server().await {
        Ok(()) => println!("  Server: {}", style("reachable").green()),
        Err(e) => println!("  Server: {} ({})", style("unreachable").red(), e),
    }

    let mut app = ChatApp::open(loader, settings)?;
    let models = app.list_models().await;
    println!("  Default model: {}", app.model_context().active_model());
    println!("  Installed models: {}", models.len());
    println!();

    println!("{}", style("Chats:").bold());
    println!("  File: {}", app.session_file().display());
    println!("  Chats: {}", app.store().len());
    if let Some(active) = app.active_session() {
        println!("  First chat: {}", active);
    }

    Ok(())
}
