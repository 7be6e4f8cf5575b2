//! Repository trait 定義
//!
//! ドメイン層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{Conversation, ConversationId, Message, ParticipantPair, RepositoryError, Timestamp, UserId};

/// Conversation Repository trait
///
/// 会話の永続化ストアへのインターフェース。メッセージの永続性の唯一の情報源であり、
/// オフラインのユーザー宛てメッセージの受け皿も兼ねる。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// 正規化済みペアで会話を検索し、無ければメッセージ空の会話を作成する
    ///
    /// 同じペアに対する同時呼び出しでも会話は 1 つしか作られない。
    async fn find_or_create(
        &self,
        participants: &ParticipantPair,
        now: Timestamp,
    ) -> Result<Conversation, RepositoryError>;

    /// 会話にメッセージを追記し、追記後の会話を返す
    async fn append(
        &self,
        conversation_id: &ConversationId,
        message: Message,
    ) -> Result<Conversation, RepositoryError>;

    /// ユーザーが参加している全ての会話を、最終更新が新しい順に取得
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Conversation>, RepositoryError>;
}
