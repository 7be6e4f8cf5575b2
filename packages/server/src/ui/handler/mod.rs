//! HTTP and WebSocket handlers.

mod http;
mod websocket;

pub use http::{get_conversations, get_online_users, health_check};
pub use websocket::websocket_handler;
