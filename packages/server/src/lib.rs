//! Real-time private messaging core for Biblioteca Compartida.
//!
//! Users join over WebSocket, send one-to-one messages, and fetch their
//! conversation history over HTTP. Every message is persisted before it is
//! delivered; offline recipients read it from the store later.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
