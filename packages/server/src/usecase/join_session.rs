//! UseCase: セッション開始（join）処理
//!
//! `join` を受け取ったときの唯一の副作用は Connection Registry への登録。
//! 履歴は別途 HTTP で取得されるため、ここでは送らない。

use std::sync::Arc;

use crate::domain::{ConnectionId, ConnectionRegistry, UserDirectory, UserIdentity};

/// セッション開始のユースケース
pub struct JoinSessionUseCase {
    registry: Arc<dyn ConnectionRegistry>,
    directory: Arc<dyn UserDirectory>,
}

impl JoinSessionUseCase {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    /// ユーザーを接続に対応付ける
    ///
    /// 同じユーザーの古い接続は置き換えられる（古い接続自体は閉じない）。
    pub async fn execute(&self, identity: UserIdentity, connection_id: ConnectionId) {
        let user_id = identity.id.clone();
        self.directory.remember(identity).await;

        match self.registry.register(user_id.clone(), connection_id).await {
            Some(previous) => tracing::warn!(
                "User '{}' rejoined on connection '{}', superseding '{}'",
                user_id,
                connection_id,
                previous
            ),
            None => tracing::info!("User '{}' joined on connection '{}'", user_id, connection_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{UserId, Username},
        infrastructure::{directory::InMemoryUserDirectory, registry::InMemoryConnectionRegistry},
    };

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - join によって Registry に登録され、表示名が記録されること
    // - 再 join で新しい接続が有効になること（last join wins）
    // ========================================

    fn identity(id: &str, name: &str) -> UserIdentity {
        UserIdentity::new(
            UserId::new(id.to_string()).unwrap(),
            Username::new(name.to_string()).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_join_registers_connection_and_username() {
        // テスト項目: join で接続が登録され、表示名が記録される
        // given (前提条件):
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let directory = Arc::new(InMemoryUserDirectory::new());
        let usecase = JoinSessionUseCase::new(registry.clone(), directory.clone());
        let conn = ConnectionId::generate();

        // when (操作):
        usecase.execute(identity("u1", "ana"), conn).await;

        // then (期待する結果):
        let u1 = UserId::new("u1".to_string()).unwrap();
        assert_eq!(registry.lookup(&u1).await, Some(conn));
        assert_eq!(
            directory.username_of(&u1).await.map(Username::into_string),
            Some("ana".to_string())
        );
    }

    #[tokio::test]
    async fn test_rejoin_supersedes_previous_connection() {
        // テスト項目: 同じユーザーの再 join で新しい接続が有効になる
        // given (前提条件):
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let directory = Arc::new(InMemoryUserDirectory::new());
        let usecase = JoinSessionUseCase::new(registry.clone(), directory.clone());
        let old_conn = ConnectionId::generate();
        let new_conn = ConnectionId::generate();
        usecase.execute(identity("u1", "ana"), old_conn).await;

        // when (操作):
        usecase.execute(identity("u1", "ana maría"), new_conn).await;

        // then (期待する結果):
        let u1 = UserId::new("u1".to_string()).unwrap();
        assert_eq!(registry.lookup(&u1).await, Some(new_conn));
        assert_eq!(
            directory.username_of(&u1).await.map(Username::into_string),
            Some("ana maría".to_string())
        );
    }
}
