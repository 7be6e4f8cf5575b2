//! MessagePusher trait 定義
//!
//! 接続へのメッセージ送信（通知）の抽象化。Registry が接続 ID だけを扱えるよう、
//! 実際の送信チャンネルはこちらが管理する。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ConnectionId, MessagePushError, RoutedMessage};

/// 接続の書き込みタスクへ繋がる送信チャンネル
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// MessagePusher trait
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続の送信チャンネルを登録
    async fn attach(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 接続の送信チャンネルを登録解除
    async fn detach(&self, connection_id: &ConnectionId);

    /// 特定の接続に、エンコード済みのメッセージをそのまま送信
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError>;

    /// ルーティング済みメッセージをワイヤ形式に変換して特定の接続に配信
    async fn deliver(
        &self,
        connection_id: &ConnectionId,
        message: &RoutedMessage,
    ) -> Result<(), MessagePushError>;
}
