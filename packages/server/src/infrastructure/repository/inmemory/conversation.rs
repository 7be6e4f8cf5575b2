//! InMemory Conversation Repository 実装
//!
//! ドメイン層が定義する ConversationRepository trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。プロセスが終了すると内容は失われるため、
//! 永続化が必要な環境では `RedbConversationRepository` を使うこと。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    Conversation, ConversationId, ConversationRepository, Message, ParticipantPair,
    RepositoryError, Timestamp, UserId, sort_by_recent_activity,
};

#[derive(Debug, Default)]
struct Store {
    conversations: HashMap<ConversationId, Conversation>,
    /// ParticipantPair::key() → 会話 ID
    pair_index: HashMap<String, ConversationId>,
}

/// インメモリ Conversation Repository 実装
#[derive(Debug, Default)]
pub struct InMemoryConversationRepository {
    store: Mutex<Store>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存されている会話の数
    pub async fn count(&self) -> usize {
        self.store.lock().await.conversations.len()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_or_create(
        &self,
        participants: &ParticipantPair,
        now: Timestamp,
    ) -> Result<Conversation, RepositoryError> {
        let mut store = self.store.lock().await;
        let key = participants.key();

        if let Some(id) = store.pair_index.get(&key)
            && let Some(existing) = store.conversations.get(id)
        {
            return Ok(existing.clone());
        }

        let conversation = Conversation::new(participants.clone(), now);
        store.pair_index.insert(key, conversation.id);
        store
            .conversations
            .insert(conversation.id, conversation.clone());
        tracing::debug!(
            "Created conversation '{}' for ({}, {})",
            conversation.id,
            participants.low(),
            participants.high()
        );
        Ok(conversation)
    }

    async fn append(
        &self,
        conversation_id: &ConversationId,
        message: Message,
    ) -> Result<Conversation, RepositoryError> {
        let mut store = self.store.lock().await;
        let conversation = store
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| RepositoryError::ConversationNotFound(conversation_id.to_string()))?;
        conversation.append(message);
        Ok(conversation.clone())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Conversation>, RepositoryError> {
        let store = self.store.lock().await;
        let mut conversations: Vec<Conversation> = store
            .conversations
            .values()
            .filter(|c| c.has_participant(user_id))
            .cloned()
            .collect();
        sort_by_recent_activity(&mut conversations);
        Ok(conversations)
    }
}
