//! Domain logic for client-side operations.
//!
//! This module contains pure functions that implement business logic
//! without side effects, making them easy to test.

use crate::error::ClientError;

/// A line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `@<user> <text>`
    Send { to: String, message: String },
    /// `/history`
    History,
    /// `/help`
    Help,
}

/// Parse a prompt line into a command.
///
/// Returns a human readable reason on failure.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    match line {
        "/history" => return Ok(Command::History),
        "/help" => return Ok(Command::Help),
        _ => {}
    }

    let Some(rest) = line.strip_prefix('@') else {
        return Err(format!("unknown command '{line}'"));
    };
    let Some((to, message)) = rest.split_once(char::is_whitespace) else {
        return Err("usage: @<user> <message>".to_string());
    };
    let message = message.trim();
    if to.is_empty() || message.is_empty() {
        return Err("usage: @<user> <message>".to_string());
    }

    Ok(Command::Send {
        to: to.to_string(),
        message: message.to_string(),
    })
}

/// Check if the client should exit immediately based on the error type.
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(error, ClientError::InvalidIdentity(_))
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `error` - The client error that occurred
/// * `current_attempt` - The current reconnection attempt count (0-indexed)
/// * `max_attempts` - The maximum number of reconnection attempts allowed
pub fn should_attempt_reconnect(
    error: &ClientError,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    if should_exit_immediately(error) {
        return false;
    }

    current_attempt < max_attempts
}
