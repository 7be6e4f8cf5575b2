//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - 接続ごとの `UnboundedSender` を管理
//! - 接続へのメッセージ送信（push_to）
//! - ルーティング済みメッセージの private message イベントへの変換（deliver）
//!
//! ## 設計ノート
//!
//! WebSocket の生成と書き込みタスクは UI 層（`ui/handler/websocket.rs`）が持つ。
//! この実装は受け取った sender を接続 ID で引けるようにするだけで、
//! ユーザー ID との対応は Connection Registry の責務。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ConnectionId, MessagePushError, MessagePusher, PusherChannel, RoutedMessage},
    infrastructure::dto::websocket::ServerEvent,
};

/// WebSocket を使った MessagePusher 実装
///
/// ```ignore
/// let pusher = WebSocketMessagePusher::new();
/// pusher.attach(connection_id, tx).await;
/// pusher.push_to(&connection_id, "{\"event\":\"private message\",...}").await?;
/// ```
#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// 接続 ID → 書き込みタスクへの sender
    channels: Mutex<HashMap<ConnectionId, PusherChannel>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn attach(&self, connection_id: ConnectionId, sender: PusherChannel) {
        let mut channels = self.channels.lock().await;
        channels.insert(connection_id, sender);
        tracing::debug!("Connection '{}' attached to MessagePusher", connection_id);
    }

    async fn detach(&self, connection_id: &ConnectionId) {
        let mut channels = self.channels.lock().await;
        channels.remove(connection_id);
        tracing::debug!("Connection '{}' detached from MessagePusher", connection_id);
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError> {
        let channels = self.channels.lock().await;

        let sender = channels
            .get(connection_id)
            .ok_or_else(|| MessagePushError::ConnectionNotFound(connection_id.to_string()))?;
        sender
            .send(content.to_string())
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::debug!("Pushed message to connection '{}'", connection_id);
        Ok(())
    }

    async fn deliver(
        &self,
        connection_id: &ConnectionId,
        message: &RoutedMessage,
    ) -> Result<(), MessagePushError> {
        let json = serde_json::to_string(&ServerEvent::from(message))
            .map_err(|e| MessagePushError::EncodeFailed(e.to_string()))?;
        self.push_to(connection_id, &json).await
    }
}
