//! Infrastructure 層
//!
//! ドメイン層が定義する trait の具体的な実装と、ワイヤ形式（DTO）を提供する。

pub mod directory;
pub mod dto;
pub mod message_pusher;
pub mod registry;
pub mod repository;
