//! Conversation history over the HTTP API.

use biblioteca_server::infrastructure::dto::http::ConversationDto;

use crate::error::ClientError;

/// Fetch every conversation of `user_id`, most recently active first
pub async fn fetch_history(
    http: &reqwest::Client,
    api_base: &str,
    user_id: &str,
) -> Result<Vec<ConversationDto>, ClientError> {
    let url = format!("{}/conversations/{}", api_base.trim_end_matches('/'), user_id);

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| ClientError::HistoryError(e.to_string()))?;

    if response.status() == reqwest::StatusCode::BAD_REQUEST {
        return Err(ClientError::InvalidIdentity(user_id.to_string()));
    }

    let response = response
        .error_for_status()
        .map_err(|e| ClientError::HistoryError(e.to_string()))?;
    response
        .json::<Vec<ConversationDto>>()
        .await
        .map_err(|e| ClientError::HistoryError(e.to_string()))
}
