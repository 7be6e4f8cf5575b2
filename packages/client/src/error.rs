//! Error types for the messaging client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected our user id; retrying cannot help
    #[error("User id '{0}' was rejected by the server")]
    InvalidIdentity(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Conversation history could not be fetched
    #[error("History error: {0}")]
    HistoryError(String),
}
