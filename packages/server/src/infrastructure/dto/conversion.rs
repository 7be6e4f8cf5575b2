//! Conversion logic between DTOs and domain entities.

use biblioteca_shared::time::timestamp_to_rfc3339;

use crate::domain::{Conversation, Message, RoutedMessage, UserId, Username};
use crate::infrastructure::dto::{http, websocket};

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&RoutedMessage> for websocket::DeliveredMessagePayload {
    fn from(model: &RoutedMessage) -> Self {
        Self {
            from_user_id: model.from.as_str().to_string(),
            to_user_id: model.to.as_str().to_string(),
            message: model.content.as_str().to_string(),
            timestamp: timestamp_to_rfc3339(model.timestamp.value()),
            conversation_id: model.conversation_id.to_string(),
        }
    }
}

impl From<&RoutedMessage> for websocket::ServerEvent {
    fn from(model: &RoutedMessage) -> Self {
        Self::PrivateMessage(model.into())
    }
}

impl From<Message> for http::MessageDto {
    fn from(model: Message) -> Self {
        Self {
            sender: model.sender.into_string(),
            content: model.content.into_string(),
            timestamp: timestamp_to_rfc3339(model.timestamp.value()),
        }
    }
}

/// 会話を HTTP レスポンスに変換する。`username_of` は参加者の表示名を解決する
pub fn conversation_to_dto(
    conversation: Conversation,
    username_of: impl Fn(&UserId) -> Option<Username>,
) -> http::ConversationDto {
    let participants = conversation
        .participants
        .to_vec()
        .into_iter()
        .map(|id| http::ParticipantDto {
            username: username_of(&id).map(Username::into_string),
            id: id.into_string(),
        })
        .collect();

    http::ConversationDto {
        conversation_id: conversation.id.to_string(),
        participants,
        messages: conversation.messages.into_iter().map(Into::into).collect(),
        created_at: timestamp_to_rfc3339(conversation.created_at.value()),
        updated_at: timestamp_to_rfc3339(conversation.updated_at.value()),
    }
}
