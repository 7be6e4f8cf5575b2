//! UseCase 層
//!
//! ドメイン層の trait を組み合わせて、アプリケーションの操作を実装する。

pub mod disconnect_session;
pub mod error;
pub mod join_session;
pub mod list_conversations;
pub mod route_message;

use std::{future::Future, time::Duration};

pub use disconnect_session::DisconnectSessionUseCase;
pub use error::{ListConversationsError, RouteError};
pub use join_session::JoinSessionUseCase;
pub use list_conversations::{ConversationHistory, ListConversationsUseCase};
pub use route_message::{Delivery, RouteMessageUseCase, RouteOutcome};

use crate::domain::RepositoryError;

/// ストア自身の書き込み期限を過ぎてから、呼び出し側が待ち続ける猶予
///
/// 期限を守るストアはこの猶予の前に成功か `DeadlineExceeded` を返す。
const STORE_GRACE: Duration = Duration::from_secs(1);

/// ストア呼び出しに上限時間を設ける。エラーは呼び出し元に返すための文言にする
///
/// 上限は `timeout + STORE_GRACE`。打ち切った時点で書き込みが終わっている
/// 可能性があるため、これは期限を持たないストアに対する最後の砦として扱う。
async fn call_store<T>(
    timeout: Duration,
    operation: impl Future<Output = Result<T, RepositoryError>>,
) -> Result<T, String> {
    let limit = timeout.saturating_add(STORE_GRACE);
    match tokio::time::timeout(limit, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::warn!("Conversation store call failed: {}", e);
            Err(e.to_string())
        }
        Err(_) => {
            tracing::warn!(
                "Conversation store did not respond within {} ms",
                limit.as_millis()
            );
            Err(format!(
                "conversation store did not respond within {} ms",
                limit.as_millis()
            ))
        }
    }
}
