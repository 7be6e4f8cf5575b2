//! WebSocket client session management.

use biblioteca_server::infrastructure::dto::websocket::{
    ClientEvent, JoinPayload, PrivateMessagePayload, ServerEvent,
};
use futures_util::{SinkExt, StreamExt};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use super::{
    domain::{Command, parse_command},
    error::ClientError,
    formatter::MessageFormatter,
    history::fetch_history,
    runner::ClientConfig,
    ui::redisplay_prompt,
};

fn encode(event: &ClientEvent) -> Result<Message, ClientError> {
    serde_json::to_string(event)
        .map(|json| Message::Text(json.into()))
        .map_err(|e| ClientError::ConnectionError(format!("failed to encode event: {e}")))
}

async fn print_history(http: &reqwest::Client, config: &ClientConfig) -> Result<(), ClientError> {
    let conversations = fetch_history(http, &config.api, &config.user_id).await?;
    print!(
        "{}",
        MessageFormatter::format_history(&conversations, &config.user_id)
    );
    redisplay_prompt(&config.user_id);
    Ok(())
}

/// Run the WebSocket client session
pub async fn run_client_session(
    config: &ClientConfig,
    http: &reqwest::Client,
) -> Result<(), ClientError> {
    let (ws_stream, _response) = connect_async(&config.url)
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;
    let (mut write, mut read) = ws_stream.split();

    // Identify this connection before anything else
    let join = ClientEvent::Join(JoinPayload {
        id: config.user_id.clone(),
        username: config.username.clone(),
    });
    write
        .send(encode(&join)?)
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;

    tracing::info!("Connected to messaging server!");
    println!(
        "\nYou are '{}'. Type @<user> <message> to send, /history to list conversations, /help for help. Press Ctrl+C to exit.",
        config.user_id
    );

    // Messages that arrived while we were offline are only in the history
    match print_history(http, config).await {
        Err(ClientError::InvalidIdentity(id)) => return Err(ClientError::InvalidIdentity(id)),
        Err(e) => tracing::warn!("Could not load history: {}", e),
        Ok(()) => {}
    }

    // Spawn a task to handle incoming events
    let user_id_for_read = config.user_id.clone();
    let mut read_task = tokio::spawn(async move {
        let mut connection_error = false;

        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let formatted = match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(ServerEvent::PrivateMessage(payload)) => {
                            MessageFormatter::format_private_message(&payload, &user_id_for_read)
                        }
                        Ok(ServerEvent::Error(payload)) => MessageFormatter::format_error(&payload),
                        Err(_) => MessageFormatter::format_raw_message(&text),
                    };
                    print!("{}", formatted);
                    redisplay_prompt(&user_id_for_read);
                }
                Ok(Message::Binary(data)) => {
                    print!("{}", MessageFormatter::format_binary_message(data.len()));
                    redisplay_prompt(&user_id_for_read);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed the connection");
                    connection_error = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    connection_error = true;
                    break;
                }
                _ => {}
            }
        }

        connection_error
    });

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let prompt = format!("{}> ", config.user_id);
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    // Spawn a task to turn prompt lines into events
    let write_config = config.clone();
    let write_http = http.clone();
    let mut write_task = tokio::spawn(async move {
        let mut write_error = false;

        while let Some(line) = input_rx.recv().await {
            let event = match parse_command(&line) {
                Ok(Command::Send { to, message }) => {
                    ClientEvent::PrivateMessage(PrivateMessagePayload {
                        from_user_id: write_config.user_id.clone(),
                        to_user_id: to,
                        message,
                    })
                }
                Ok(Command::History) => {
                    if let Err(e) = print_history(&write_http, &write_config).await {
                        println!("\n! {}", e);
                        redisplay_prompt(&write_config.user_id);
                    }
                    continue;
                }
                Ok(Command::Help) => {
                    print!("{}", MessageFormatter::format_help());
                    redisplay_prompt(&write_config.user_id);
                    continue;
                }
                Err(reason) => {
                    println!("{}", reason);
                    redisplay_prompt(&write_config.user_id);
                    continue;
                }
            };

            let frame = match encode(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!("{}", e);
                    continue;
                }
            };
            if let Err(e) = write.send(frame).await {
                tracing::warn!("Failed to send message: {}", e);
                write_error = true;
                break;
            }
        }

        write_error
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        read_result = &mut read_task => {
            write_task.abort();
            if read_result.unwrap_or(false) {
                return Err(ClientError::ConnectionError("Connection lost".to_string()));
            }
        }
        write_result = &mut write_task => {
            read_task.abort();
            if write_result.unwrap_or(false) {
                return Err(ClientError::ConnectionError("Connection lost".to_string()));
            }
        }
    }

    Ok(())
}
