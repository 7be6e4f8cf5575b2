//! Conversation Repository の実装
//!
//! - `inmemory`: プロセス内の HashMap（テスト・開発用）
//! - `redb`: redb による永続化

pub mod inmemory;
pub mod redb;

pub use inmemory::InMemoryConversationRepository;
pub use self::redb::RedbConversationRepository;
