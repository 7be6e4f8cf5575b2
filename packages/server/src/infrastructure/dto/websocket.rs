//! WebSocket event DTOs.
//!
//! Every frame is a JSON text message of the form `{"event": "<name>", "data": {...}}`.
//! Payloads reject unknown fields, so ad hoc shapes (e.g. `content` instead of
//! `message`) fail to parse instead of being half-understood.

use serde::{Deserialize, Serialize};

/// Events sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join")]
    Join(JoinPayload),
    #[serde(rename = "private message")]
    PrivateMessage(PrivateMessagePayload),
}

/// Events sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "private message")]
    PrivateMessage(DeliveredMessagePayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinPayload {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PrivateMessagePayload {
    pub from_user_id: String,
    pub to_user_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveredMessagePayload {
    pub from_user_id: String,
    pub to_user_id: String,
    pub message: String,
    /// RFC 3339 (UTC, milliseconds)
    pub timestamp: String,
    pub conversation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidMessage,
    PersistenceFailure,
    NotJoined,
    MalformedEvent,
}

impl ServerEvent {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            code,
            message: message.into(),
        })
    }
}
