//! UseCase 層のエラー定義

use thiserror::Error;

/// メッセージルーティングのエラー
///
/// 受信者がオフラインであることはエラーではない（`Delivery::RecipientOffline`）。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// 内容が空・長すぎる、送信者と受信者が同一、などの入力不備
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// 会話ストアへの保存に失敗した（タイムアウトを含む）
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

/// 会話一覧取得のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListConversationsError {
    #[error("failed to load conversations: {0}")]
    PersistenceFailure(String),
}
