//! メッセージ送信（通知）の実装
//!
//! - `websocket`: WebSocket の書き込みタスクへ mpsc で渡す実装

pub mod websocket;

pub use websocket::WebSocketMessagePusher;
