//! ドメイン層
//!
//! 値オブジェクト・エンティティと、外部の協調者（会話ストア・接続レジストリ・
//! メッセージ送信・ユーザー情報）へのインターフェースを定義する。

pub mod directory;
pub mod entity;
pub mod error;
pub mod message_pusher;
pub mod registry;
pub mod repository;
pub mod value_object;

pub use directory::UserDirectory;
pub use entity::{Conversation, Message, RoutedMessage, UserIdentity, sort_by_recent_activity};
pub use error::{MessagePushError, RepositoryError, ValueObjectError};
pub use message_pusher::{MessagePusher, PusherChannel};
pub use registry::ConnectionRegistry;
pub use repository::ConversationRepository;
#[cfg(test)]
pub use repository::MockConversationRepository;
pub use value_object::{
    ConnectionId, ConversationId, MessageContent, ParticipantPair, Timestamp, UserId, Username,
};
