//! UseCase: メッセージルーティング処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RouteMessageUseCase::execute() メソッド
//! - 永続化 → 受信者の検索 → 配信 → 送信者へのエコー、の順序
//!
//! ### なぜこのテストが必要か
//! - 受信者がオンラインかどうかに関わらず、メッセージが必ず 1 回だけ保存されること
//! - 保存に失敗したときは配信せず、呼び出し元にエラーを返すこと
//!
//! ### どのような状況を想定しているか
//! - 正常系：オンラインの受信者への配信、オフラインの受信者（配信なし）
//! - 異常系：空のメッセージ、自分宛て、ストアのエラー・タイムアウト
//! - エッジケース：Registry には残っているが送信チャンネルが閉じた接続

use std::{sync::Arc, time::Duration};

use biblioteca_shared::time::Clock;

use crate::domain::{
    ConnectionRegistry, ConversationRepository, Message, MessageContent, MessagePusher,
    ParticipantPair, RoutedMessage, Timestamp, UserId,
};

use super::{call_store, error::RouteError};

/// 受信者への配信結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// 受信者の現在の接続に配信した
    Delivered,
    /// 受信者がオフライン。メッセージは保存済みで、次回の履歴取得で届く
    RecipientOffline,
}

/// ルーティング結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    pub message: RoutedMessage,
    pub delivery: Delivery,
}

/// メッセージルーティングのユースケース
pub struct RouteMessageUseCase {
    /// 会話ストア（メッセージの永続性の唯一の情報源）
    repository: Arc<dyn ConversationRepository>,
    registry: Arc<dyn ConnectionRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    /// ストア呼び出し 1 回あたりの上限時間
    store_timeout: Duration,
    /// 保存済みのメッセージを送信者の接続にも返すか
    echo_to_sender: bool,
}

impl RouteMessageUseCase {
    pub fn new(
        repository: Arc<dyn ConversationRepository>,
        registry: Arc<dyn ConnectionRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
        echo_to_sender: bool,
    ) -> Self {
        Self {
            repository,
            registry,
            message_pusher,
            clock,
            store_timeout,
            echo_to_sender,
        }
    }

    /// メッセージを保存し、受信者がオンラインなら配信する
    ///
    /// # Returns
    ///
    /// * `Ok(RouteOutcome)` - 保存済み（配信できたかどうかは `delivery` を見る）
    /// * `Err(RouteError::InvalidMessage)` - 入力不備。ストアには触れていない
    /// * `Err(RouteError::PersistenceFailure)` - 保存に失敗。配信もしていない
    pub async fn execute(
        &self,
        from: UserId,
        to: UserId,
        content: String,
    ) -> Result<RouteOutcome, RouteError> {
        // 1. 入力の検証（ストアに触れる前に行う）
        let content =
            MessageContent::new(content).map_err(|e| RouteError::InvalidMessage(e.to_string()))?;
        let participants = ParticipantPair::new(from.clone(), to.clone())
            .map_err(|e| RouteError::InvalidMessage(e.to_string()))?;

        // 2. 正規化済みペアで会話を取得（無ければ作成）
        let now = Timestamp::new(self.clock.now_millis());
        let conversation = call_store(
            self.store_timeout,
            self.repository.find_or_create(&participants, now),
        )
        .await
        .map_err(RouteError::PersistenceFailure)?;

        // 3. 受信者の状態に関わらず追記する
        let message = Message::new(from.clone(), content.clone(), now);
        call_store(
            self.store_timeout,
            self.repository.append(&conversation.id, message),
        )
        .await
        .map_err(RouteError::PersistenceFailure)?;

        let routed = RoutedMessage {
            conversation_id: conversation.id,
            from,
            to,
            content,
            timestamp: now,
        };

        // 4-6. 受信者の接続を引いて配信
        let delivery = self.deliver_to_recipient(&routed).await;

        // 7. 送信者の接続へエコー
        if self.echo_to_sender {
            self.echo(&routed).await;
        }

        Ok(RouteOutcome {
            message: routed,
            delivery,
        })
    }

    async fn deliver_to_recipient(&self, routed: &RoutedMessage) -> Delivery {
        let Some(connection_id) = self.registry.lookup(&routed.to).await else {
            tracing::debug!(
                "Recipient '{}' is offline; message kept in conversation '{}'",
                routed.to,
                routed.conversation_id
            );
            return Delivery::RecipientOffline;
        };

        match self.message_pusher.deliver(&connection_id, routed).await {
            Ok(()) => {
                tracing::debug!(
                    "Delivered message from '{}' to '{}' ('{}')",
                    routed.from,
                    routed.to,
                    connection_id
                );
                Delivery::Delivered
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to deliver to '{}' on stale connection '{}': {}",
                    routed.to,
                    connection_id,
                    e
                );
                Delivery::RecipientOffline
            }
        }
    }

    async fn echo(&self, routed: &RoutedMessage) {
        let Some(connection_id) = self.registry.lookup(&routed.from).await else {
            return;
        };
        if let Err(e) = self.message_pusher.deliver(&connection_id, routed).await {
            tracing::warn!(
                "Failed to echo message back to '{}' ('{}'): {}",
                routed.from,
                connection_id,
                e
            );
        }
    }
}
