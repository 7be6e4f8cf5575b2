//! エンティティ

use serde::{Deserialize, Serialize};

use super::value_object::{
    ConversationId, MessageContent, ParticipantPair, Timestamp, UserId, Username,
};

/// 認証済みユーザーの識別情報（ユーザー管理サブシステムが所有し、ここでは読むだけ）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: UserId,
    pub username: Username,
}

impl UserIdentity {
    pub fn new(id: UserId, username: Username) -> Self {
        Self { id, username }
    }
}

/// 会話内の 1 メッセージ。追加後は変更・削除されない
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: UserId,
    pub content: MessageContent,
    pub timestamp: Timestamp,
}

impl Message {
    pub fn new(sender: UserId, content: MessageContent, timestamp: Timestamp) -> Self {
        Self {
            sender,
            content,
            timestamp,
        }
    }
}

/// 2 ユーザー間の会話
///
/// メッセージは追記のみ。配列の順序がそのまま時系列順になる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: ParticipantPair,
    pub messages: Vec<Message>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Conversation {
    /// メッセージが空の会話を作成
    pub fn new(participants: ParticipantPair, created_at: Timestamp) -> Self {
        Self {
            id: ConversationId::generate(),
            participants,
            messages: Vec::new(),
            created_at,
            updated_at: created_at,
        }
    }

    /// メッセージを末尾に追加し、最終更新時刻を進める
    ///
    /// 時計が巻き戻っても `updated_at` は減少しない。
    pub fn append(&mut self, message: Message) {
        self.updated_at = self.updated_at.max(message.timestamp);
        self.messages.push(message);
    }

    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participants.contains(user_id)
    }
}

/// ルーティング済みのメッセージ（永続化後、配信に使う内容）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedMessage {
    pub conversation_id: ConversationId,
    pub from: UserId,
    pub to: UserId,
    pub content: MessageContent,
    pub timestamp: Timestamp,
}

/// 最近更新された会話が先頭に来るように並べ替える
pub fn sort_by_recent_activity(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}
