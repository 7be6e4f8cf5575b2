//! Private messaging server.
//!
//! Routes one-to-one messages between joined users and persists every message.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin biblioteca-server
//! cargo run --bin biblioteca-server -- --port 3000 --db-path ./biblioteca.redb
//! ```

use std::sync::Arc;

use biblioteca_server::{
    config::ServerConfig,
    domain::ConversationRepository,
    infrastructure::repository::{InMemoryConversationRepository, RedbConversationRepository},
    ui::{Server, state::AppState},
};
use biblioteca_shared::{logger::setup_logger, time::SystemClock};
use clap::Parser;

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let config = ServerConfig::parse();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    // 1. Create Repository
    let repository: Arc<dyn ConversationRepository> = match &config.db_path {
        Some(path) => match RedbConversationRepository::open(path) {
            Ok(repository) => {
                tracing::info!("Conversations are stored in {}", path.display());
                Arc::new(repository.with_write_timeout(config.store_timeout()))
            }
            Err(e) => {
                tracing::error!("Failed to open {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("No database path given; conversations are kept in memory only");
            Arc::new(InMemoryConversationRepository::new())
        }
    };

    // 2. Wire UseCases around the repository
    let state = AppState::new(
        repository,
        Arc::new(SystemClock),
        config.store_timeout(),
        config.echo_to_sender,
    );

    // 3. Create and run the server
    let server = Server::new(state);
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
