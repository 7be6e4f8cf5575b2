//! InMemory UserDirectory 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{UserDirectory, UserId, UserIdentity, Username};

/// `join` で提示された表示名を覚えておくだけのディレクトリ
///
/// ## 上限
///
/// エントリは削除されず、プロセスが動いている間は増える一方になる。
/// 大きさは「起動後に join した異なるユーザー ID の数」で、同じ ID の再 join は
/// 既存のエントリを上書きするだけ。切断してもエントリは残る。
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    usernames: RwLock<HashMap<UserId, Username>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 記録しているユーザー数
    pub async fn count(&self) -> usize {
        self.usernames.read().await.len()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn remember(&self, identity: UserIdentity) {
        let mut usernames = self.usernames.write().await;
        usernames.insert(identity.id, identity.username);
    }

    async fn username_of(&self, user_id: &UserId) -> Option<Username> {
        let usernames = self.usernames.read().await;
        usernames.get(user_id).cloned()
    }
}
