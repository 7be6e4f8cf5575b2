//! Terminal client for Biblioteca Compartida private messaging.

mod domain;
pub mod error;
mod formatter;
mod history;
mod runner;
mod session;
mod ui;

pub use runner::{ClientConfig, run_client};
