//! Shared application state.

use std::{sync::Arc, time::Duration};

use biblioteca_shared::time::Clock;

use crate::{
    domain::{ConnectionRegistry, ConversationRepository, MessagePusher},
    infrastructure::{
        directory::InMemoryUserDirectory, message_pusher::WebSocketMessagePusher,
        registry::InMemoryConnectionRegistry,
    },
    usecase::{
        DisconnectSessionUseCase, JoinSessionUseCase, ListConversationsUseCase,
        RouteMessageUseCase,
    },
};

/// Shared application state
pub struct AppState {
    /// JoinSessionUseCase（join の処理）
    pub join_session_usecase: Arc<JoinSessionUseCase>,
    /// DisconnectSessionUseCase（切断の処理）
    pub disconnect_session_usecase: Arc<DisconnectSessionUseCase>,
    /// RouteMessageUseCase（private message の処理）
    pub route_message_usecase: Arc<RouteMessageUseCase>,
    /// ListConversationsUseCase（履歴の取得）
    pub list_conversations_usecase: Arc<ListConversationsUseCase>,
    /// 接続ごとの送信チャンネルを登録するため
    pub message_pusher: Arc<dyn MessagePusher>,
    /// オンラインのユーザー一覧を返すため
    pub registry: Arc<dyn ConnectionRegistry>,
}

impl AppState {
    /// Wire the in-process collaborators (registry, pusher, directory) around a
    /// conversation store.
    ///
    /// Dependencies are created in order:
    /// 1. Registry / MessagePusher / UserDirectory
    /// 2. UseCases
    pub fn new(
        repository: Arc<dyn ConversationRepository>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
        echo_to_sender: bool,
    ) -> Self {
        // 1. In-memory collaborators
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let message_pusher = Arc::new(WebSocketMessagePusher::new());
        let directory = Arc::new(InMemoryUserDirectory::new());

        // 2. UseCases
        let join_session_usecase = Arc::new(JoinSessionUseCase::new(
            registry.clone(),
            directory.clone(),
        ));
        let disconnect_session_usecase = Arc::new(DisconnectSessionUseCase::new(
            registry.clone(),
            message_pusher.clone(),
        ));
        let route_message_usecase = Arc::new(RouteMessageUseCase::new(
            repository.clone(),
            registry.clone(),
            message_pusher.clone(),
            clock,
            store_timeout,
            echo_to_sender,
        ));
        let list_conversations_usecase = Arc::new(ListConversationsUseCase::new(
            repository,
            directory,
            store_timeout,
        ));

        Self {
            join_session_usecase,
            disconnect_session_usecase,
            route_message_usecase,
            list_conversations_usecase,
            message_pusher,
            registry,
        }
    }
}
