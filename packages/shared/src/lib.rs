//! Utilities shared by the Biblioteca Compartida server and client.

pub mod logger;
pub mod time;
