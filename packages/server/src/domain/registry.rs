//! Connection Registry trait 定義
//!
//! 論理的なユーザー ID と、現在有効なトランスポート接続（の不透明な参照）を対応付ける。

use async_trait::async_trait;

use super::{ConnectionId, UserId};

/// Connection Registry trait
///
/// 1 ユーザーにつき有効な接続は高々 1 つ。新しい `register` は古い対応を黙って置き換える
/// （古い接続を切断はしない）。全操作は互いにアトミックに見えなければならない。
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// 対応を登録（上書き）する。置き換えられた接続があれば返す
    async fn register(&self, user_id: UserId, connection_id: ConnectionId) -> Option<ConnectionId>;

    /// ユーザーの現在の接続を取得
    async fn lookup(&self, user_id: &UserId) -> Option<ConnectionId>;

    /// この接続を指している対応を削除し、そのユーザー ID を返す
    ///
    /// 既に新しい接続で置き換えられている場合などは何もしない。
    async fn remove(&self, connection_id: &ConnectionId) -> Option<UserId>;

    /// オンラインのユーザー ID 一覧（ソート済み）
    async fn online_users(&self) -> Vec<UserId>;
}
