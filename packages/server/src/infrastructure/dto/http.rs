//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// One conversation in `GET /conversations/{user_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub conversation_id: String,
    pub participants: Vec<ParticipantDto>,
    pub messages: Vec<MessageDto>,
    /// RFC 3339 (UTC)
    pub created_at: String,
    /// RFC 3339 (UTC)
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantDto {
    pub id: String,
    /// Display name, when the user has joined since the server started
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDto {
    pub sender: String,
    pub content: String,
    /// RFC 3339 (UTC)
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUsersDto {
    pub users: Vec<String>,
}
