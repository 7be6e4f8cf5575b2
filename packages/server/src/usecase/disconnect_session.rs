//! UseCase: 切断処理
//!
//! 切断された接続を Registry と MessagePusher から取り除く。
//! 匿名接続や、既に新しい接続で置き換えられた古い接続の切断は何もしない。

use std::sync::Arc;

use crate::domain::{ConnectionId, ConnectionRegistry, MessagePusher, UserId};

/// 切断のユースケース
pub struct DisconnectSessionUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl DisconnectSessionUseCase {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            registry,
            message_pusher,
        }
    }

    /// 切断を実行
    ///
    /// # Returns
    ///
    /// * `Some(UserId)` - この接続に対応していたユーザー
    /// * `None` - 匿名接続、または既に置き換え済みの接続
    pub async fn execute(&self, connection_id: &ConnectionId) -> Option<UserId> {
        self.message_pusher.detach(connection_id).await;

        let removed = self.registry.remove(connection_id).await;
        match &removed {
            Some(user_id) => {
                tracing::info!("User '{}' disconnected ('{}')", user_id, connection_id)
            }
            None => tracing::debug!(
                "Connection '{}' closed without an active registration",
                connection_id
            ),
        }
        removed
    }
}
