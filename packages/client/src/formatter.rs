//! Message formatting utilities for client display.

use biblioteca_server::infrastructure::dto::{
    http::ConversationDto,
    websocket::{DeliveredMessagePayload, ErrorPayload},
};
use chrono::{DateTime, SecondsFormat, Utc};

const RULE: &str = "------------------------------------------------------------";
const DOUBLE_RULE: &str = "============================================================";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format an incoming (or echoed) private message
    ///
    /// # Arguments
    ///
    /// * `payload` - The delivered message
    /// * `me` - The current user's id; our own echoed messages are shown as `me -> peer`
    pub fn format_private_message(payload: &DeliveredMessagePayload, me: &str) -> String {
        let header = if payload.from_user_id == me {
            format!("me -> @{}", payload.to_user_id)
        } else {
            format!("@{}", payload.from_user_id)
        };
        format!(
            "\n\n{RULE}\n{}: {}\nsent at {}\n{RULE}\n",
            header,
            payload.message,
            Self::display_time(&payload.timestamp)
        )
    }

    /// Format an error event from the server
    pub fn format_error(payload: &ErrorPayload) -> String {
        let code = serde_json::to_value(payload.code)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{:?}", payload.code));
        format!("\n! {}: {}\n", code, payload.message)
    }

    /// Format the conversation history, most recently active first
    pub fn format_history(conversations: &[ConversationDto], me: &str) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n\n{DOUBLE_RULE}\nConversations:\n"));

        if conversations.is_empty() {
            output.push_str("(No conversations yet)\n");
        }

        for conversation in conversations {
            let peer = conversation
                .participants
                .iter()
                .find(|p| p.id != me)
                .map(|p| match &p.username {
                    Some(name) => format!("{} ({})", p.id, name),
                    None => p.id.clone(),
                })
                .unwrap_or_else(|| "?".to_string());
            output.push_str(&format!(
                "\n# with {} - last activity {}\n",
                peer,
                Self::display_time(&conversation.updated_at)
            ));
            for message in &conversation.messages {
                let who = if message.sender == me {
                    "me"
                } else {
                    message.sender.as_str()
                };
                output.push_str(&format!(
                    "  [{}] {}: {}\n",
                    Self::display_time(&message.timestamp),
                    who,
                    message.content
                ));
            }
        }

        output.push_str(&format!("{DOUBLE_RULE}\n"));
        output
    }

    /// Format the list of prompt commands
    pub fn format_help() -> String {
        "\nCommands:\n  @<user> <message>  send a private message\n  /history           show your conversations\n  /help              show this help\n".to_string()
    }

    /// Format a binary message notification
    pub fn format_binary_message(byte_count: usize) -> String {
        format!("\n← Received {} bytes of binary data\n", byte_count)
    }

    /// Format a raw text message (when parsing fails)
    pub fn format_raw_message(text: &str) -> String {
        format!("\n← Received: {}\n", text)
    }

    /// RFC 3339 → `YYYY-MM-DDTHH:MM:SSZ`; unparsable values are shown verbatim
    fn display_time(rfc3339: &str) -> String {
        DateTime::parse_from_rfc3339(rfc3339)
            .map(|t| {
                t.with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
            })
            .unwrap_or_else(|_| rfc3339.to_string())
    }
}
