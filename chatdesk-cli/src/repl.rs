//! Interactive chat loop

use anyhow::Result;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::app::ChatApp;

/// A line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Prompt(String),
    New,
    List,
    Switch(String),
    Rename(String),
    Delete(String),
    Show,
    Models,
    Model(String),
    Help,
    Quit,
    Usage(&'static str),
    Unknown(String),
}

/// Parse one input line. Anything not starting with `/` is a prompt.
pub fn parse_input(line: &str) -> ReplInput {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return ReplInput::Prompt(line.to_string());
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    let with_arg = |make: fn(String) -> ReplInput, usage: &'static str| {
        if rest.is_empty() {
            ReplInput::Usage(usage)
        } else {
            make(rest.to_string())
        }
    };

    match name {
        "new" => ReplInput::New,
        "list" => ReplInput::List,
        "switch" => with_arg(ReplInput::Switch, "/switch NAME"),
        "rename" => with_arg(ReplInput::Rename, "/rename NEW NAME"),
        "delete" => with_arg(ReplInput::Delete, "/delete NAME"),
        "show" => ReplInput::Show,
        "models" => ReplInput::Models,
        "model" => with_arg(ReplInput::Model, "/model NAME"),
        "help" => ReplInput::Help,
        "quit" | "exit" => ReplInput::Quit,
        other => ReplInput::Unknown(other.to_string()),
    }
}

struct Palette {
    user: Style,
    assistant: Style,
    info: Style,
    error: Style,
}

impl Palette {
    fn new(dark_mode: bool) -> Self {
        if dark_mode {
            Self {
                user: Style::new().bold().white(),
                assistant: Style::new().bold().cyan(),
                info: Style::new().dim(),
                error: Style::new().red(),
            }
        } else {
            Self {
                user: Style::new().bold().black(),
                assistant: Style::new().bold().blue(),
                info: Style::new().yellow(),
                error: Style::new().red().bold(),
            }
        }
    }
}

const HELP: &str = "\
Type a message and press Enter to send it.
  /new             start a new chat
  /list            list chats
  /switch NAME     switch to a chat
  /rename NAME     rename the current chat
  /delete NAME     delete a chat
  /show            print the current chat
  /models          list installed models
  /model NAME      use another model
  /help            show this help
  /quit            leave";

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_chat(app: &ChatApp, palette: &Palette) {
    let Some(name) = app.active_session() else {
        println!("{}", palette.info.apply_to("No active chat."));
        return;
    };
    println!("{}", palette.info.apply_to(format!("== {} ==", name)));
    for message in app.store().messages(name).unwrap_or_default() {
        let style = match message.role.as_str() {
            "user" => &palette.user,
            _ => &palette.assistant,
        };
        println!("{} {}\n", style.apply_to(format!("{}:", message.role.label())), message.content);
    }
}

fn print_list(app: &ChatApp, palette: &Palette) {
    if app.store().is_empty() {
        println!("{}", palette.info.apply_to("No chats yet."));
        return;
    }
    for name in app.store().names() {
        let marker = if app.active_session() == Some(name) { "*" } else { " " };
        let count = app.store().messages(name).map_or(0, |m| m.len());
        println!("{} {} ({} messages)", marker, name, count);
    }
}

/// Run the chat loop until `/quit` or end of input
pub async fn run(app: &mut ChatApp) -> Result<()> {
    let palette = Palette::new(app.settings().dark_mode);
    let session = app.ensure_session();
    info!("Starting chat in {}", session);

    println!(
        "{} {} {}",
        palette.assistant.apply_to("chatdesk"),
        palette.info.apply_to(format!("chat: {}", session)),
        palette.info.apply_to(format!("model: {}", app.model_context().active_model())),
    );
    println!("{}", palette.info.apply_to("Type /help for commands."));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", palette.user.apply_to("You:"));
        std::io::Write::flush(&mut std::io::stdout())?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_input(&line) {
            ReplInput::Prompt(text) if text.is_empty() => {}
            ReplInput::Prompt(text) => {
                let pb = spinner("Thinking...");
                let result = app.submit(&text).await;
                pb.finish_and_clear();
                match result {
                    Ok(Some(reply)) => {
                        println!("{} {}\n", palette.assistant.apply_to("Assistant:"), reply)
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Generation failed: {}", e);
                        println!("{}", palette.error.apply_to(format!("Error: {}", e)));
                    }
                }
            }
            ReplInput::New => {
                let name = app.new_session();
                println!("{}", palette.info.apply_to(format!("Started {}", name)));
            }
            ReplInput::List => print_list(app, &palette),
            ReplInput::Switch(name) => match app.switch_session(&name) {
                Ok(()) => print_chat(app, &palette),
                Err(e) => println!("{}", palette.error.apply_to(e)),
            },
            ReplInput::Rename(new) => {
                let Some(current) = app.active_session().map(str::to_string) else {
                    println!("{}", palette.error.apply_to("No active chat."));
                    continue;
                };
                match app.rename_session(&current, &new) {
                    Ok(()) => println!("{}", palette.info.apply_to(format!("Renamed to {}", new))),
                    Err(e) => println!("{}", palette.error.apply_to(e)),
                }
            }
            ReplInput::Delete(name) => match app.delete_session(&name) {
                Ok(()) => {
                    println!("{}", palette.info.apply_to(format!("Deleted {}", name)));
                    let current = app.ensure_session();
                    println!("{}", palette.info.apply_to(format!("Now in {}", current)));
                }
                Err(e) => println!("{}", palette.error.apply_to(e)),
            },
            ReplInput::Show => print_chat(app, &palette),
            ReplInput::Models => {
                let active = app.model_context().active_model().to_string();
                let models = app.list_models().await;
                if models.is_empty() {
                    println!("{}", palette.info.apply_to("No models found."));
                }
                for model in models {
                    let marker = if model == active { "*" } else { " " };
                    println!("{} {}", marker, model);
                }
            }
            ReplInput::Model(name) => {
                app.list_models().await;
                if app.override_model(&name) {
                    println!("{}", palette.info.apply_to(format!("Using {}", name)));
                } else {
                    println!(
                        "{}",
                        palette.error.apply_to(format!("Model '{}' is not installed", name))
                    );
                }
            }
            ReplInput::Help => println!("{}", HELP),
            ReplInput::Quit => break,
            ReplInput::Usage(usage) => {
                println!("{}", palette.error.apply_to(format!("Usage: {}", usage)))
            }
            ReplInput::Unknown(command) => println!(
                "{}",
                palette
                    .error
                    .apply_to(format!("Unknown command /{}. Type /help.", command))
            ),
        }
    }

    info!("Chat loop finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_prompt() {
        assert_eq!(parse_input("  hello there \n"), ReplInput::Prompt("hello there".into()));
        assert_eq!(parse_input(""), ReplInput::Prompt(String::new()));
    }

    #[test]
    fn test_commands_with_names_keep_spaces() {
        assert_eq!(parse_input("/switch Chat 2"), ReplInput::Switch("Chat 2".into()));
        assert_eq!(
            parse_input("/rename  Trip planning "),
            ReplInput::Rename("Trip planning".into())
        );
        assert_eq!(parse_input("/delete Chat 1"), ReplInput::Delete("Chat 1".into()));
        assert_eq!(parse_input("/model mistral"), ReplInput::Model("mistral".into()));
    }

    #[test]
    fn test_missing_argument_gives_usage() {
        assert_eq!(parse_input("/switch"), ReplInput::Usage("/switch NAME"));
        assert_eq!(parse_input("/delete   "), ReplInput::Usage("/delete NAME"));
    }

    #[test]
    fn test_simple_and_unknown_commands() {
        assert_eq!(parse_input("/new"), ReplInput::New);
        assert_eq!(parse_input("/list"), ReplInput::List);
        assert_eq!(parse_input("/show"), ReplInput::Show);
        assert_eq!(parse_input("/models"), ReplInput::Models);
        assert_eq!(parse_input("/help"), ReplInput::Help);
        assert_eq!(parse_input("/exit"), ReplInput::Quit);
        assert_eq!(parse_input("/frobnicate"), ReplInput::Unknown("frobnicate".into()));
    }
}
