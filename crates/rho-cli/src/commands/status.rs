//! /status command - show the active conversation and its document index

use super::CommandResult;
use crate::utils::readiness_str;
use rho_session::Client;

pub struct StatusCommand;

impl StatusCommand {
    pub fn execute(client: &Client) -> CommandResult {
        let (Some(id), Some(status)) = (client.active_conversation(), client.readiness()) else {
            return CommandResult::Message("No conversation open.".to_string());
        };

        let messages = client.transcript();
        let user_msgs = messages.iter().filter(|m| m.is_user()).count();
        let errors = messages.iter().filter(|m| m.is_error).count();

        let mut output = String::from("Conversation Info\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');
        output.push_str(&format!("Conversation: {}\n", id));
        output.push_str(&format!("Documents:    {}\n", readiness_str(&status)));
        output.push_str(&format!(
            "Messages:     {} total, {} questions",
            messages.len(),
            user_msgs
        ));
        if errors > 0 {
            output.push_str(&format!(", {} failed", errors));
        }
        output.push('\n');
        output.push_str(&format!(
            "Can send:     {}",
            if client.can_send() { "yes" } else { "no" }
        ));

        CommandResult::Message(output)
    }
}
