//! UserDirectory trait 定義
//!
//! 外部のユーザー管理サブシステムへの問い合わせ口。ここでは `join` 時に提示された
//! 表示名を覚えておき、会話履歴の参加者情報を補うためだけに使う。

use async_trait::async_trait;

use super::{UserId, UserIdentity, Username};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// ユーザーの識別情報を記録（既存なら表示名を更新）
    async fn remember(&self, identity: UserIdentity);

    /// 表示名を取得。未知のユーザーなら `None`
    async fn username_of(&self, user_id: &UserId) -> Option<Username>;
}
