//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    domain::UserId,
    infrastructure::dto::{
        conversion::conversation_to_dto,
        http::{ConversationDto, OnlineUsersDto},
    },
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Conversation history for a user, most recently active first
pub async fn get_conversations(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ConversationDto>>, StatusCode> {
    let user_id = match UserId::new(user_id) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Rejected history request: {}", e);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    match state.list_conversations_usecase.execute(&user_id).await {
        Ok(history) => {
            // Domain Model から DTO への変換
            let usernames = history.usernames;
            let conversations = history
                .conversations
                .into_iter()
                .map(|c| conversation_to_dto(c, |id| usernames.get(id).cloned()))
                .collect();
            Ok(Json(conversations))
        }
        Err(e) => {
            tracing::error!("Failed to load conversations for '{}': {}", user_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Users that currently hold a registered connection
pub async fn get_online_users(State(state): State<Arc<AppState>>) -> Json<OnlineUsersDto> {
    let users = state
        .registry
        .online_users()
        .await
        .into_iter()
        .map(UserId::into_string)
        .collect();
    Json(OnlineUsersDto { users })
}
