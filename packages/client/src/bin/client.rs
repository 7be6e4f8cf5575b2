//! Terminal client for private messages.
//!
//! Joins the server as the given user, prints the conversation history and then
//! reads commands from the prompt (`@<user> <message>`, `/history`, `/help`).
//! Automatically reconnects on disconnection (max 5 attempts with 5 second interval).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin biblioteca-client -- --user-id u1 --username ana
//! cargo run --bin biblioteca-client -- -i u2 -n bea --url ws://127.0.0.1:3000/ws --api http://127.0.0.1:3000
//! ```

use clap::Parser;

use biblioteca_client::{ClientConfig, run_client};
use biblioteca_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "biblioteca-client")]
#[command(about = "Terminal client for Biblioteca Compartida private messages", long_about = None)]
struct Args {
    /// User id to join as
    #[arg(short = 'i', long)]
    user_id: String,

    /// Display name shown to other users
    #[arg(short = 'n', long)]
    username: String,

    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// HTTP API base URL (conversation history)
    #[arg(short = 'a', long, default_value = "http://127.0.0.1:8080")]
    api: String,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = ClientConfig {
        user_id: args.user_id,
        username: args.username,
        url: args.url,
        api: args.api,
    };

    if let Err(e) = run_client(config).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
