//! Slash commands for interactive mode

mod history;
mod status;

pub use history::HistoryCommand;
pub use status::StatusCommand;

use rho_api::ConversationId;
use rho_session::Client;

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Switch to another conversation
    Open(ConversationId),
    /// Close the active conversation
    Close,
    /// Re-fetch the active conversation's history
    Reload,
    /// Show a message to the user (not sent to the backend)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, client: &Client) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "open" | "o" => match args.parse::<ConversationId>() {
            Ok(id) => CommandResult::Open(id),
            Err(_) if args.is_empty() => {
                CommandResult::Message("Usage: /open <conversation id>".to_string())
            }
            Err(_) => CommandResult::Message(format!("Not a conversation id: {}", args)),
        },

        "close" => CommandResult::Close,

        "status" | "s" => StatusCommand::execute(client),

        "history" => HistoryCommand::execute(args, client),

        "reload" | "r" => CommandResult::Reload,

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /open, /o <id>       Switch to a conversation
  /close               Close the current conversation
  /status, /s          Show the conversation and document status
  /history [n]         Show the last n messages (default 20)
  /reload, /r          Reload the conversation history from the server
  /quit, /exit, /q     Exit rho

Anything else is sent as a question. Press Ctrl-C to stop an answer."#
        .to_string()
}
