//! UseCase: 会話履歴の取得
//!
//! リアルタイムチャネルとは別に、リクエスト/レスポンスで履歴を返す。
//! オフライン中に届いたメッセージもここで受け取る。

use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::domain::{Conversation, ConversationRepository, UserDirectory, UserId, Username};

use super::{call_store, error::ListConversationsError};

/// 会話履歴と、参加者の表示名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHistory {
    /// 最終更新が新しい順
    pub conversations: Vec<Conversation>,
    /// 表示名が分かっている参加者のみ
    pub usernames: HashMap<UserId, Username>,
}

impl ConversationHistory {
    pub fn username_of(&self, user_id: &UserId) -> Option<Username> {
        self.usernames.get(user_id).cloned()
    }
}

/// 会話履歴取得のユースケース
pub struct ListConversationsUseCase {
    repository: Arc<dyn ConversationRepository>,
    directory: Arc<dyn UserDirectory>,
    store_timeout: Duration,
}

impl ListConversationsUseCase {
    pub fn new(
        repository: Arc<dyn ConversationRepository>,
        directory: Arc<dyn UserDirectory>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            directory,
            store_timeout,
        }
    }

    pub async fn execute(
        &self,
        user_id: &UserId,
    ) -> Result<ConversationHistory, ListConversationsError> {
        let conversations = call_store(self.store_timeout, self.repository.list_for_user(user_id))
            .await
            .map_err(ListConversationsError::PersistenceFailure)?;

        let mut usernames = HashMap::new();
        for participant in conversations
            .iter()
            .flat_map(|c| c.participants.to_vec())
        {
            if usernames.contains_key(&participant) {
                continue;
            }
            if let Some(username) = self.directory.username_of(&participant).await {
                usernames.insert(participant, username);
            }
        }

        tracing::debug!(
            "Loaded {} conversation(s) for '{}'",
            conversations.len(),
            user_id
        );
        Ok(ConversationHistory {
            conversations,
            usernames,
        })
    }
}
