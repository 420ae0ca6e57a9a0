//! /history command - print the tail of the transcript

use super::CommandResult;
use crate::utils::truncate_chars;
use rho_session::Client;

const DEFAULT_COUNT: usize = 20;
const PREVIEW_CHARS: usize = 100;

pub struct HistoryCommand;

impl HistoryCommand {
    pub fn execute(args: &str, client: &Client) -> CommandResult {
        if client.active_conversation().is_none() {
            return CommandResult::Message("No conversation open.".to_string());
        }

        let count = if args.is_empty() {
            DEFAULT_COUNT
        } else {
            match args.parse::<usize>() {
                Ok(n) => n,
                Err(_) => return CommandResult::Message("Usage: /history [count]".to_string()),
            }
        };

        let messages = client.transcript();
        if messages.is_empty() {
            return CommandResult::Message("No messages yet.".to_string());
        }

        let skip = messages.len().saturating_sub(count);
        let lines: Vec<String> = messages
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(i, msg)| {
                let role = if msg.is_error {
                    "error"
                } else {
                    msg.role.as_str()
                };
                let preview = truncate_chars(&msg.content, PREVIEW_CHARS).replace('\n', " ");
                format!(
                    "  {}: {} [{}] {}",
                    i,
                    msg.created_at.format("%Y-%m-%d %H:%M"),
                    role,
                    preview
                )
            })
            .collect();

        CommandResult::Message(lines.join("\n"))
    }
}
