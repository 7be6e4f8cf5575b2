//! InMemory Connection Registry 実装
//!
//! ユーザー → 接続 の対応と、接続 → ユーザー の逆引きインデックスを 1 つのロックで保護する。
//! 逆引きがあるので切断時の `remove` は値の走査ではなく O(1) で済む。
//!
//! ロックを保持したまま I/O を待つことはない（永続化は Registry の外で行われる）。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ConnectionId, ConnectionRegistry, UserId};

#[derive(Debug, Default)]
struct RegistryTable {
    by_user: HashMap<UserId, ConnectionId>,
    by_connection: HashMap<ConnectionId, UserId>,
}

/// インメモリ Connection Registry 実装
#[derive(Debug, Default)]
pub struct InMemoryConnectionRegistry {
    table: Mutex<RegistryTable>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn register(&self, user_id: UserId, connection_id: ConnectionId) -> Option<ConnectionId> {
        let mut table = self.table.lock().await;

        // 同じ接続が別ユーザーとして登録済みなら、その対応を先に外す
        if let Some(previous_user) = table.by_connection.remove(&connection_id)
            && previous_user != user_id
        {
            table.by_user.remove(&previous_user);
        }

        let replaced = table.by_user.insert(user_id.clone(), connection_id);
        if let Some(old) = replaced
            && old != connection_id
        {
            table.by_connection.remove(&old);
        }
        table.by_connection.insert(connection_id, user_id);

        replaced.filter(|old| *old != connection_id)
    }

    async fn lookup(&self, user_id: &UserId) -> Option<ConnectionId> {
        let table = self.table.lock().await;
        table.by_user.get(user_id).copied()
    }

    async fn remove(&self, connection_id: &ConnectionId) -> Option<UserId> {
        let mut table = self.table.lock().await;
        let user_id = table.by_connection.remove(connection_id)?;

        if table.by_user.get(&user_id) == Some(connection_id) {
            table.by_user.remove(&user_id);
        }
        Some(user_id)
    }

    async fn online_users(&self) -> Vec<UserId> {
        let table = self.table.lock().await;
        let mut users: Vec<UserId> = table.by_user.keys().cloned().collect();
        users.sort();
        users
    }
}
