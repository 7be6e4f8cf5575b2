//! WebSocket connection handlers.
//!
//! Each socket gets a fresh `ConnectionId` and walks the state machine
//! `Anonymous -> Joined(user) -> Closed`. Outbound frames (deliveries from other
//! connections and error replies for this one) all go through the same channel,
//! drained by `pusher_loop`.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{
    sink::{Sink, SinkExt},
    stream::StreamExt,
};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    domain::{ConnectionId, PusherChannel, UserId, UserIdentity, Username},
    infrastructure::dto::websocket::{
        ClientEvent, ErrorCode, JoinPayload, PrivateMessagePayload, ServerEvent,
    },
    ui::state::AppState,
    usecase::RouteError,
};

/// How long the writer may keep flushing queued frames after the reader ends.
const WRITER_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Per-connection session state
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConnectionState {
    Anonymous,
    Joined(UserId),
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that receives messages from the rx channel and pushes them to the WebSocket sender.
///
/// Ends when the channel closes or the socket stops accepting writes.
fn pusher_loop<S>(mut rx: mpsc::UnboundedReceiver<String>, mut sender: S) -> JoinHandle<()>
where
    S: Sink<Message> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = ConnectionId::generate();
    let (tx, rx) = mpsc::unbounded_channel();
    state.message_pusher.attach(connection_id, tx.clone()).await;
    tracing::info!("Connection '{}' opened", connection_id);

    let (sender, mut receiver) = socket.split();
    let state_clone = state.clone();

    // Spawn a task to receive events from this connection
    let mut recv_task = tokio::spawn(async move {
        let mut session = ConnectionState::Anonymous;
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", connection_id, e);
                    break;
                }
            };

            let reply = match msg {
                Message::Text(text) => {
                    handle_text(&state_clone, connection_id, &mut session, text.as_str()).await
                }
                Message::Binary(_) => Some(ServerEvent::error(
                    ErrorCode::MalformedEvent,
                    "binary frames are not supported",
                )),
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", connection_id);
                    break;
                }
                // Ping/pong is handled automatically by the WebSocket protocol
                _ => None,
            };

            if let Some(event) = reply {
                reply_to(&tx, connection_id, &event);
            }
        }
    });

    // Spawn a task to push outbound frames to this connection
    let mut send_task = pusher_loop(rx, sender);

    // When the reader ends, detach first so the channel closes, then let the
    // writer flush replies that are still queued. When the writer ends, the
    // socket is gone and the reader is aborted.
    tokio::select! {
        _ = &mut recv_task => {
            state
                .disconnect_session_usecase
                .execute(&connection_id)
                .await;
            drain_writer(connection_id, send_task, WRITER_DRAIN_GRACE).await;
        }
        _ = &mut send_task => {
            recv_task.abort();
            state
                .disconnect_session_usecase
                .execute(&connection_id)
                .await;
        }
    };
    tracing::info!("Connection '{}' closed", connection_id);
}

/// Wait for the writer to flush its queue once every sender is gone, aborting it after `grace`.
async fn drain_writer(connection_id: ConnectionId, mut send_task: JoinHandle<()>, grace: Duration) {
    if tokio::time::timeout(grace, &mut send_task).await.is_err() {
        tracing::debug!(
            "Writer for '{}' did not drain within {} ms",
            connection_id,
            grace.as_millis()
        );
        send_task.abort();
    }
}

/// Handle one text frame. Returns an event to send back to this connection, if any.
async fn handle_text(
    state: &AppState,
    connection_id: ConnectionId,
    session: &mut ConnectionState,
    text: &str,
) -> Option<ServerEvent> {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Malformed event on '{}': {}", connection_id, e);
            return Some(ServerEvent::error(
                ErrorCode::MalformedEvent,
                format!("malformed event: {e}"),
            ));
        }
    };

    match event {
        ClientEvent::Join(payload) => handle_join(state, connection_id, session, payload).await,
        ClientEvent::PrivateMessage(payload) => {
            handle_private_message(state, connection_id, session, payload).await
        }
    }
}

async fn handle_join(
    state: &AppState,
    connection_id: ConnectionId,
    session: &mut ConnectionState,
    payload: JoinPayload,
) -> Option<ServerEvent> {
    if let ConnectionState::Joined(current) = session {
        tracing::warn!(
            "Connection '{}' tried to join again (already '{}')",
            connection_id,
            current
        );
        return Some(ServerEvent::error(
            ErrorCode::InvalidMessage,
            format!("connection already joined as '{current}'"),
        ));
    }

    let identity = match (UserId::new(payload.id), Username::new(payload.username)) {
        (Ok(id), Ok(username)) => UserIdentity::new(id, username),
        (Err(e), _) | (_, Err(e)) => {
            return Some(ServerEvent::error(ErrorCode::InvalidMessage, e.to_string()));
        }
    };

    let user_id = identity.id.clone();
    state
        .join_session_usecase
        .execute(identity, connection_id)
        .await;
    *session = ConnectionState::Joined(user_id);
    None
}

async fn handle_private_message(
    state: &AppState,
    connection_id: ConnectionId,
    session: &ConnectionState,
    payload: PrivateMessagePayload,
) -> Option<ServerEvent> {
    let ConnectionState::Joined(joined) = session else {
        return Some(ServerEvent::error(
            ErrorCode::NotJoined,
            "send a join event before private messages",
        ));
    };

    let from = match UserId::new(payload.from_user_id) {
        Ok(id) if &id == joined => id,
        Ok(id) => {
            tracing::warn!(
                "Connection '{}' joined as '{}' but sent as '{}'",
                connection_id,
                joined,
                id
            );
            return Some(ServerEvent::error(
                ErrorCode::InvalidMessage,
                format!("fromUserId must be '{joined}'"),
            ));
        }
        Err(e) => return Some(ServerEvent::error(ErrorCode::InvalidMessage, e.to_string())),
    };
    let to = match UserId::new(payload.to_user_id) {
        Ok(id) => id,
        Err(e) => return Some(ServerEvent::error(ErrorCode::InvalidMessage, e.to_string())),
    };

    match state
        .route_message_usecase
        .execute(from, to, payload.message)
        .await
    {
        Ok(outcome) => {
            tracing::debug!(
                "Routed message in '{}' ({:?})",
                outcome.message.conversation_id,
                outcome.delivery
            );
            None
        }
        Err(RouteError::InvalidMessage(reason)) => {
            Some(ServerEvent::error(ErrorCode::InvalidMessage, reason))
        }
        Err(RouteError::PersistenceFailure(reason)) => {
            Some(ServerEvent::error(ErrorCode::PersistenceFailure, reason))
        }
    }
}

fn reply_to(tx: &PusherChannel, connection_id: ConnectionId, event: &ServerEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            if tx.send(json).is_err() {
                tracing::debug!("Connection '{}' closed before reply", connection_id);
            }
        }
        Err(e) => tracing::error!("Failed to encode reply for '{}': {}", connection_id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::{
        domain::{
            Conversation, ConversationRepository, MockConversationRepository, RepositoryError,
        },
        infrastructure::repository::InMemoryConversationRepository,
    };
    use biblioteca_shared::time::FixedClock;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - 接続ごとの状態遷移（Anonymous → Joined）
    // - 不正なイベントへの error 応答と、その後も接続が使えること
    // - 保存に失敗した private message への persistence_failure 応答
    // - 読み取り側の終了後も、キューに残った応答が書き出されること
    // ========================================

    struct Harness {
        state: AppState,
        repository: Arc<InMemoryConversationRepository>,
    }

    fn harness() -> Harness {
        let repository = Arc::new(InMemoryConversationRepository::new());
        let state = AppState::new(
            repository.clone(),
            Arc::new(FixedClock::new(1_000)),
            Duration::from_secs(1),
            false,
        );
        Harness { state, repository }
    }

    fn error_code(event: Option<ServerEvent>) -> ErrorCode {
        match event {
            Some(ServerEvent::Error(payload)) => payload.code,
            other => panic!("expected an error event, got {other:?}"),
        }
    }

    const JOIN_U1: &str = r#"{"event":"join","data":{"id":"u1","username":"ana"}}"#;
    const HOLA_U1_TO_U2: &str = r#"{"event":"private message","data":{"fromUserId":"u1","toUserId":"u2","message":"hola"}}"#;

    #[tokio::test]
    async fn test_join_moves_connection_to_joined() {
        // テスト項目: join で Joined になり、Registry に登録される
        // given (前提条件):
        let h = harness();
        let conn = ConnectionId::generate();
        let mut session = ConnectionState::Anonymous;

        // when (操作):
        let reply = handle_text(&h.state, conn, &mut session, JOIN_U1).await;

        // then (期待する結果):
        let u1 = UserId::new("u1".to_string()).unwrap();
        assert_eq!(reply, None);
        assert_eq!(session, ConnectionState::Joined(u1.clone()));
        assert_eq!(h.state.registry.lookup(&u1).await, Some(conn));
    }

    #[tokio::test]
    async fn test_second_join_is_rejected() {
        // テスト項目: 既に join 済みの接続での再 join は invalid_message
        // given (前提条件):
        let h = harness();
        let conn = ConnectionId::generate();
        let mut session = ConnectionState::Anonymous;
        handle_text(&h.state, conn, &mut session, JOIN_U1).await;

        // when (操作):
        let reply = handle_text(
            &h.state,
            conn,
            &mut session,
            r#"{"event":"join","data":{"id":"u9","username":"otro"}}"#,
        )
        .await;

        // then (期待する結果):
        assert_eq!(error_code(reply), ErrorCode::InvalidMessage);
        let u9 = UserId::new("u9".to_string()).unwrap();
        assert_eq!(h.state.registry.lookup(&u9).await, None);
    }

    #[tokio::test]
    async fn test_private_message_before_join_is_rejected() {
        // テスト項目: join 前の private message は not_joined で、保存されない
        // given (前提条件):
        let h = harness();
        let mut session = ConnectionState::Anonymous;

        // when (操作):
        let reply = handle_text(
            &h.state,
            ConnectionId::generate(),
            &mut session,
            HOLA_U1_TO_U2,
        )
        .await;

        // then (期待する結果):
        assert_eq!(error_code(reply), ErrorCode::NotJoined);
        assert_eq!(h.repository.count().await, 0);
    }

    #[tokio::test]
    async fn test_private_message_with_foreign_sender_is_rejected() {
        // テスト項目: join した ID と異なる fromUserId は invalid_message
        // given (前提条件):
        let h = harness();
        let conn = ConnectionId::generate();
        let mut session = ConnectionState::Anonymous;
        handle_text(
            &h.state,
            conn,
            &mut session,
            r#"{"event":"join","data":{"id":"u2","username":"bea"}}"#,
        )
        .await;

        // when (操作):
        let reply = handle_text(&h.state, conn, &mut session, HOLA_U1_TO_U2).await;

        // then (期待する結果):
        assert_eq!(error_code(reply), ErrorCode::InvalidMessage);
        assert_eq!(h.repository.count().await, 0);
    }

    #[tokio::test]
    async fn test_private_message_is_persisted() {
        // テスト項目: join 済みの接続からの private message は保存される
        // given (前提条件):
        let h = harness();
        let conn = ConnectionId::generate();
        let mut session = ConnectionState::Anonymous;
        handle_text(&h.state, conn, &mut session, JOIN_U1).await;

        // when (操作):
        let reply = handle_text(&h.state, conn, &mut session, HOLA_U1_TO_U2).await;

        // then (期待する結果):
        assert_eq!(reply, None);
        let u2 = UserId::new("u2".to_string()).unwrap();
        let stored = h.repository.list_for_user(&u2).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].messages[0].content.as_str(), "hola");
    }

    #[tokio::test]
    async fn test_malformed_events_keep_session() {
        // テスト項目: 解析できないフレームは malformed_event で、状態は変わらない
        // given (前提条件):
        let h = harness();
        let conn = ConnectionId::generate();
        let mut session = ConnectionState::Anonymous;

        // when (操作):
        let not_json = handle_text(&h.state, conn, &mut session, "hola").await;
        let unknown_event = handle_text(
            &h.state,
            conn,
            &mut session,
            r#"{"event":"typing","data":{}}"#,
        )
        .await;
        let ad_hoc_shape = handle_text(
            &h.state,
            conn,
            &mut session,
            r#"{"event":"private message","data":{"fromUserId":"u1","toUserId":"u2","content":"hola"}}"#,
        )
        .await;

        // then (期待する結果):
        assert_eq!(error_code(not_json), ErrorCode::MalformedEvent);
        assert_eq!(error_code(unknown_event), ErrorCode::MalformedEvent);
        assert_eq!(error_code(ad_hoc_shape), ErrorCode::MalformedEvent);
        assert_eq!(session, ConnectionState::Anonymous);

        let reply = handle_text(&h.state, conn, &mut session, JOIN_U1).await;
        assert_eq!(reply, None);
    }

    #[tokio::test]
    async fn test_reply_to_closed_channel_does_not_panic() {
        // テスト項目: 受信側が閉じていても reply_to は失敗を握りつぶす
        // given (前提条件):
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        // when (操作) / then (期待する結果):
        reply_to(
            &tx,
            ConnectionId::generate(),
            &ServerEvent::error(ErrorCode::NotJoined, "join first"),
        );
    }

    #[tokio::test]
    async fn test_private_message_reports_persistence_failure() {
        // テスト項目: ストアへの追記が失敗したら、送信者に persistence_failure を返す
        // given (前提条件):
        let mut repository = MockConversationRepository::new();
        repository
            .expect_find_or_create()
            .times(1)
            .returning(|pair, now| Ok(Conversation::new(pair.clone(), now)));
        repository
            .expect_append()
            .times(1)
            .returning(|_, _| Err(RepositoryError::Storage("disk full".to_string())));
        let state = AppState::new(
            Arc::new(repository),
            Arc::new(FixedClock::new(1_000)),
            Duration::from_secs(1),
            false,
        );
        let conn = ConnectionId::generate();
        let mut session = ConnectionState::Anonymous;
        handle_text(&state, conn, &mut session, JOIN_U1).await;

        // when (操作):
        let reply = handle_text(&state, conn, &mut session, HOLA_U1_TO_U2).await;

        // then (期待する結果):
        match reply {
            Some(ServerEvent::Error(payload)) => {
                assert_eq!(payload.code, ErrorCode::PersistenceFailure);
                assert_eq!(payload.message, "storage error: disk full");
            }
            other => panic!("expected an error event, got {other:?}"),
        }
    }

    /// 書き込まれたフレームをチャンネルに流す Sink
    fn capturing_sink() -> (
        impl Sink<Message> + Unpin + Send + 'static,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel::<Message>();
        let sink = Box::pin(futures_util::sink::unfold(
            frames_tx,
            |frames_tx, frame: Message| async move {
                frames_tx.send(frame).map_err(|_| ())?;
                Ok::<_, ()>(frames_tx)
            },
        ));
        (sink, frames_rx)
    }

    #[tokio::test]
    async fn test_writer_flushes_queued_reply_after_reader_ends() {
        // テスト項目: 読み取り側が終わった時点でキューにある応答も書き出してから閉じる
        // given (前提条件): 最後のフレームへの応答がキューに残っている
        let conn = ConnectionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        reply_to(
            &tx,
            conn,
            &ServerEvent::error(ErrorCode::MalformedEvent, "malformed event"),
        );
        let (sink, mut frames) = capturing_sink();
        let send_task = pusher_loop(rx, sink);

        // when (操作): 送信側をすべて手放してから書き出しを待つ
        drop(tx);
        drain_writer(conn, send_task, Duration::from_secs(1)).await;

        // then (期待する結果):
        let Ok(Message::Text(text)) = frames.try_recv() else {
            panic!("expected the queued reply to be written");
        };
        let event = serde_json::from_str::<ServerEvent>(text.as_str()).unwrap();
        assert_eq!(error_code(Some(event)), ErrorCode::MalformedEvent);
        assert!(frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_writer_is_aborted_after_grace() {
        // テスト項目: チャンネルが閉じないままでも、猶予を過ぎれば書き込みタスクを止める
        // given (前提条件):
        let conn = ConnectionId::generate();
        let (_tx, rx) = mpsc::unbounded_channel::<String>();
        let (sink, _frames) = capturing_sink();
        let send_task = pusher_loop(rx, sink);

        // when (操作):
        let drained = tokio::time::timeout(
            Duration::from_secs(2),
            drain_writer(conn, send_task, Duration::from_millis(50)),
        )
        .await;

        // then (期待する結果):
        assert!(drained.is_ok());
    }
}
