//! Redb を使った Conversation Repository 実装
//!
//! redb の ACID トランザクションで会話を永続化する。サーバーを再起動しても会話は残る。
//! redb の API は同期なので、各操作は `spawn_blocking` 上で実行する。
//!
//! ## テーブル
//!
//! - `conversations`: 会話 ID → 会話の JSON ドキュメント
//! - `conversation_pairs`: ParticipantPair::key() → 会話 ID
//! - `user_conversations`: `"{user_id}\u{1f}{conversation_id}"` → 会話 ID
//!
//! 書き込みトランザクションは redb が直列化するため、`find_or_create` の
//! 「検索して無ければ作成」は同じペアに対して 1 つの会話に収束する。
//!
//! ## 書き込み期限
//!
//! 書き込みは呼び出し時点から `write_timeout` 以内にコミットする。コミット直前に
//! 期限を過ぎていればトランザクションを破棄して `DeadlineExceeded` を返すので、
//! 失敗を返した書き込みが後から残ることはない。

use std::{
    fmt::Display,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use crate::domain::{
    Conversation, ConversationId, ConversationRepository, Message, ParticipantPair,
    RepositoryError, Timestamp, UserId, sort_by_recent_activity,
};

const CONVERSATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("conversations");
const CONVERSATION_PAIRS: TableDefinition<&str, &str> =
    TableDefinition::new("conversation_pairs");
const USER_CONVERSATIONS: TableDefinition<&str, &str> =
    TableDefinition::new("user_conversations");

/// ユーザー索引キーの区切り文字と、その次のコードポイント（範囲検索の上限）
const KEY_SEPARATOR: char = '\u{1f}';
const KEY_SEPARATOR_NEXT: char = '\u{20}';

/// 書き込み期限の既定値
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// 永続化 Conversation Repository 実装
///
/// Clone は Arc のコピーのみ。
#[derive(Clone)]
pub struct RedbConversationRepository {
    db: Arc<Database>,
    write_timeout: Duration,
}

impl RedbConversationRepository {
    /// 指定パスのデータベースを開く（無ければ作成）
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let db = Database::create(path.as_ref()).map_err(storage_error)?;

        let txn = db.begin_write().map_err(storage_error)?;
        {
            txn.open_table(CONVERSATIONS).map_err(storage_error)?;
            txn.open_table(CONVERSATION_PAIRS).map_err(storage_error)?;
            txn.open_table(USER_CONVERSATIONS).map_err(storage_error)?;
        }
        txn.commit().map_err(storage_error)?;

        Ok(Self {
            db: Arc::new(db),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        })
    }

    /// 書き込み期限を設定する
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// 期限は spawn_blocking の前に決める（スレッド待ちの時間も含める）
    async fn run_blocking<T, F>(&self, operation: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&Database, WriteDeadline) -> Result<T, RepositoryError> + Send + 'static,
    {
        let db = self.db.clone();
        let deadline = WriteDeadline::after(self.write_timeout);
        tokio::task::spawn_blocking(move || operation(&db, deadline))
            .await
            .map_err(|e| RepositoryError::Storage(format!("blocking task failed: {e}")))?
    }
}

/// 書き込みトランザクションのコミット期限
#[derive(Debug, Clone, Copy)]
struct WriteDeadline {
    /// `None` は表現できないほど遠い期限（無期限）
    at: Option<Instant>,
    timeout: Duration,
}

impl WriteDeadline {
    fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
            timeout,
        }
    }

    /// 期限内ならコミットし、過ぎていれば何も書かずに破棄する
    fn commit(self, txn: WriteTransaction) -> Result<(), RepositoryError> {
        if self.at.is_some_and(|at| Instant::now() >= at) {
            txn.abort().map_err(storage_error)?;
            tracing::warn!(
                "Write transaction aborted: deadline of {} ms exceeded",
                self.timeout.as_millis()
            );
            return Err(RepositoryError::DeadlineExceeded(self.timeout.as_millis()));
        }
        txn.commit().map_err(storage_error)
    }
}

#[async_trait]
impl ConversationRepository for RedbConversationRepository {
    async fn find_or_create(
        &self,
        participants: &ParticipantPair,
        now: Timestamp,
    ) -> Result<Conversation, RepositoryError> {
        let participants = participants.clone();
        self.run_blocking(move |db, deadline| {
            find_or_create_blocking(db, &participants, now, deadline)
        })
            .await
    }

    async fn append(
        &self,
        conversation_id: &ConversationId,
        message: Message,
    ) -> Result<Conversation, RepositoryError> {
        let conversation_id = *conversation_id;
        self.run_blocking(move |db, deadline| {
            append_blocking(db, &conversation_id, message, deadline)
        })
            .await
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Conversation>, RepositoryError> {
        let user_id = user_id.clone();
        self.run_blocking(move |db, _| list_for_user_blocking(db, &user_id))
            .await
    }
}

fn find_or_create_blocking(
    db: &Database,
    participants: &ParticipantPair,
    now: Timestamp,
    deadline: WriteDeadline,
) -> Result<Conversation, RepositoryError> {
    let pair_key = participants.key();
    let txn = db.begin_write().map_err(storage_error)?;

    let (conversation, created) = {
        let mut pairs = txn.open_table(CONVERSATION_PAIRS).map_err(storage_error)?;
        let mut conversations = txn.open_table(CONVERSATIONS).map_err(storage_error)?;

        let existing_id = pairs
            .get(pair_key.as_str())
            .map_err(storage_error)?
            .map(|guard| guard.value().to_string());

        match existing_id {
            Some(id) => {
                let bytes = conversations
                    .get(id.as_str())
                    .map_err(storage_error)?
                    .map(|guard| guard.value().to_vec())
                    .ok_or(RepositoryError::ConversationNotFound(id))?;
                (decode(&bytes)?, false)
            }
            None => {
                let conversation = Conversation::new(participants.clone(), now);
                let id = conversation.id.to_string();
                let bytes = encode(&conversation)?;

                conversations
                    .insert(id.as_str(), bytes.as_slice())
                    .map_err(storage_error)?;
                pairs
                    .insert(pair_key.as_str(), id.as_str())
                    .map_err(storage_error)?;

                let mut users = txn.open_table(USER_CONVERSATIONS).map_err(storage_error)?;
                for user_id in [participants.low(), participants.high()] {
                    users
                        .insert(user_index_key(user_id, &id).as_str(), id.as_str())
                        .map_err(storage_error)?;
                }
                tracing::debug!(
                    "Created conversation '{}' for ({}, {})",
                    id,
                    participants.low(),
                    participants.high()
                );
                (conversation, true)
            }
        }
    };

    // 既存の会話を返すだけなら書き込みは無い
    if created {
        deadline.commit(txn)?;
    } else {
        txn.abort().map_err(storage_error)?;
    }
    Ok(conversation)
}

fn append_blocking(
    db: &Database,
    conversation_id: &ConversationId,
    message: Message,
    deadline: WriteDeadline,
) -> Result<Conversation, RepositoryError> {
    let id = conversation_id.to_string();
    let txn = db.begin_write().map_err(storage_error)?;

    let conversation = {
        let mut conversations = txn.open_table(CONVERSATIONS).map_err(storage_error)?;
        let bytes = conversations
            .get(id.as_str())
            .map_err(storage_error)?
            .map(|guard| guard.value().to_vec())
            .ok_or_else(|| RepositoryError::ConversationNotFound(id.clone()))?;

        let mut conversation = decode(&bytes)?;
        conversation.append(message);

        let updated = encode(&conversation)?;
        conversations
            .insert(id.as_str(), updated.as_slice())
            .map_err(storage_error)?;
        conversation
    };

    deadline.commit(txn)?;
    Ok(conversation)
}

fn list_for_user_blocking(
    db: &Database,
    user_id: &UserId,
) -> Result<Vec<Conversation>, RepositoryError> {
    let txn = db.begin_read().map_err(storage_error)?;
    let users = txn.open_table(USER_CONVERSATIONS).map_err(storage_error)?;
    let conversations = txn.open_table(CONVERSATIONS).map_err(storage_error)?;

    let start = format!("{user_id}{KEY_SEPARATOR}");
    let end = format!("{user_id}{KEY_SEPARATOR_NEXT}");

    let mut result = Vec::new();
    for entry in users
        .range(start.as_str()..end.as_str())
        .map_err(storage_error)?
    {
        let (_, id) = entry.map_err(storage_error)?;
        let id = id.value().to_string();
        let bytes = conversations
            .get(id.as_str())
            .map_err(storage_error)?
            .map(|guard| guard.value().to_vec())
            .ok_or(RepositoryError::ConversationNotFound(id))?;
        result.push(decode(&bytes)?);
    }

    sort_by_recent_activity(&mut result);
    Ok(result)
}

fn user_index_key(user_id: &UserId, conversation_id: &str) -> String {
    format!("{user_id}{KEY_SEPARATOR}{conversation_id}")
}

fn encode(conversation: &Conversation) -> Result<Vec<u8>, RepositoryError> {
    serde_json::to_vec(conversation).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Conversation, RepositoryError> {
    serde_json::from_slice(bytes).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

fn storage_error(e: impl Display) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::domain::MessageContent;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - find_or_create の正規化が永続化後も保たれること
    // - 再オープン後も会話とメッセージ順序が残ること
    // - ユーザー索引の範囲検索が前方一致する別ユーザーを拾わないこと
    // - 同じペアへの並行 find_or_create が 1 つの会話に収束すること
    // - 書き込み期限を過ぎたトランザクションがコミットされないこと
    // ========================================

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn pair(a: &str, b: &str) -> ParticipantPair {
        ParticipantPair::new(user(a), user(b)).unwrap()
    }

    fn message(sender: &str, content: &str, at: i64) -> Message {
        Message::new(
            user(sender),
            MessageContent::new(content.to_string()).unwrap(),
            Timestamp::new(at),
        )
    }

    #[tokio::test]
    async fn test_find_or_create_is_order_independent() {
        // テスト項目: (A, B) と (B, A) が同じ会話を返す
        // given (前提条件):
        let dir = tempdir().unwrap();
        let repo = RedbConversationRepository::open(dir.path().join("chat.redb")).unwrap();

        // when (操作):
        let ab = repo
            .find_or_create(&pair("u1", "u2"), Timestamp::new(1000))
            .await
            .unwrap();
        let ba = repo
            .find_or_create(&pair("u2", "u1"), Timestamp::new(2000))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(ab.id, ba.id);
        assert_eq!(ba.created_at, Timestamp::new(1000));
    }

    #[tokio::test]
    async fn test_conversations_survive_reopen() {
        // テスト項目: データベースを開き直しても会話とメッセージの順序が残る
        // given (前提条件):
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.redb");
        let conversation_id = {
            let repo = RedbConversationRepository::open(&path).unwrap();
            let conversation = repo
                .find_or_create(&pair("u1", "u3"), Timestamp::new(1000))
                .await
                .unwrap();
            repo.append(&conversation.id, message("u1", "m1", 2000))
                .await
                .unwrap();
            repo.append(&conversation.id, message("u1", "m2", 3000))
                .await
                .unwrap();
            conversation.id
        };

        // when (操作):
        let reopened = RedbConversationRepository::open(&path).unwrap();
        let listed = reopened.list_for_user(&user("u3")).await.unwrap();

        // then (期待する結果):
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, conversation_id);
        let contents: Vec<&str> = listed[0]
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["m1", "m2"]);
        assert_eq!(listed[0].updated_at, Timestamp::new(3000));
    }

    #[tokio::test]
    async fn test_list_for_user_does_not_match_id_prefix() {
        // テスト項目: "u1" の検索に "u10" の会話が含まれない
        // given (前提条件):
        let dir = tempdir().unwrap();
        let repo = RedbConversationRepository::open(dir.path().join("chat.redb")).unwrap();
        let own = repo
            .find_or_create(&pair("u1", "u2"), Timestamp::new(1000))
            .await
            .unwrap();
        repo.find_or_create(&pair("u10", "u2"), Timestamp::new(2000))
            .await
            .unwrap();

        // when (操作):
        let listed = repo.list_for_user(&user("u1")).await.unwrap();

        // then (期待する結果):
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, own.id);
        assert_eq!(repo.list_for_user(&user("u2")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_orders_by_recent_activity() {
        // テスト項目: 最近メッセージが追加された会話が先頭に来る
        // given (前提条件):
        let dir = tempdir().unwrap();
        let repo = RedbConversationRepository::open(dir.path().join("chat.redb")).unwrap();
        let first = repo
            .find_or_create(&pair("u1", "u2"), Timestamp::new(1000))
            .await
            .unwrap();
        let second = repo
            .find_or_create(&pair("u1", "u3"), Timestamp::new(2000))
            .await
            .unwrap();

        // when (操作):
        repo.append(&first.id, message("u2", "hola", 3000))
            .await
            .unwrap();
        let listed = repo.list_for_user(&user("u1")).await.unwrap();

        // then (期待する結果):
        let ids: Vec<ConversationId> = listed.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_append_to_unknown_conversation() {
        // テスト項目: 存在しない会話への追記は ConversationNotFound
        // given (前提条件):
        let dir = tempdir().unwrap();
        let repo = RedbConversationRepository::open(dir.path().join("chat.redb")).unwrap();

        // when (操作):
        let result = repo
            .append(&ConversationId::generate(), message("u1", "hola", 1000))
            .await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(RepositoryError::ConversationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_find_or_create_creates_single_conversation() {
        // テスト項目: 同じペアへの並行 find_or_create は 1 つの会話に収束する
        // given (前提条件):
        let dir = tempdir().unwrap();
        let repo = RedbConversationRepository::open(dir.path().join("chat.redb")).unwrap();

        // when (操作): ペアの順序を交互に変えて 16 タスクから同時に呼ぶ
        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            let participants = if i % 2 == 0 {
                pair("u1", "u2")
            } else {
                pair("u2", "u1")
            };
            handles.push(tokio::spawn(async move {
                repo.find_or_create(&participants, Timestamp::new(1000 + i))
                    .await
                    .unwrap()
                    .id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        // then (期待する結果):
        assert!(ids.iter().all(|id| *id == ids[0]));
        let listed = repo.list_for_user(&user("u1")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, ids[0]);
    }

    #[tokio::test]
    async fn test_append_past_deadline_is_rolled_back() {
        // テスト項目: コミット前に書き込み期限を過ぎた追記は DeadlineExceeded になり、保存されない
        // given (前提条件):
        let dir = tempdir().unwrap();
        let repo = RedbConversationRepository::open(dir.path().join("chat.redb")).unwrap();
        let conversation = repo
            .find_or_create(&pair("u1", "u2"), Timestamp::new(1000))
            .await
            .unwrap();
        let expired = repo.clone().with_write_timeout(Duration::ZERO);

        // when (操作):
        let result = expired
            .append(&conversation.id, message("u1", "hola", 2000))
            .await;

        // then (期待する結果):
        assert_eq!(result, Err(RepositoryError::DeadlineExceeded(0)));
        let listed = repo.list_for_user(&user("u1")).await.unwrap();
        assert!(listed[0].messages.is_empty());
        assert_eq!(listed[0].updated_at, Timestamp::new(1000));
    }

    #[tokio::test]
    async fn test_create_past_deadline_is_rolled_back() {
        // テスト項目: 期限切れで作成に失敗した会話は残らないが、既存の会話は期限に関係なく返る
        // given (前提条件):
        let dir = tempdir().unwrap();
        let repo = RedbConversationRepository::open(dir.path().join("chat.redb")).unwrap();
        let existing = repo
            .find_or_create(&pair("u1", "u2"), Timestamp::new(1000))
            .await
            .unwrap();
        let expired = repo.clone().with_write_timeout(Duration::ZERO);

        // when (操作):
        let created = expired
            .find_or_create(&pair("u1", "u3"), Timestamp::new(2000))
            .await;
        let found = expired
            .find_or_create(&pair("u2", "u1"), Timestamp::new(3000))
            .await;

        // then (期待する結果):
        assert_eq!(created, Err(RepositoryError::DeadlineExceeded(0)));
        assert_eq!(found.unwrap().id, existing.id);
        assert!(repo.list_for_user(&user("u3")).await.unwrap().is_empty());
    }
}
