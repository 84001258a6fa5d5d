use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::Utc;

use crate::client::ClientKey;
use crate::error::ApiError;
use crate::metrics::{CHAT_REQUESTS, TRACKED_CLIENTS};
use crate::models::{ChatRequest, ChatResponse};
use crate::state::SharedState;

// POST /api/chat
pub async fn chat_handler(
    State(state): State<SharedState>,
    client: ClientKey,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    CHAT_REQUESTS.inc();

    // an unreadable body is treated like a missing message
    let request = match payload {
        Ok(Json(request)) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Chat body could not be decoded");
            ChatRequest::default()
        }
    };

    let tag = client.tag();
    let message = request.message_text();
    let now = Utc::now().timestamp_millis();

    let admitted = state.admission.check(client.as_str(), message, now);
    TRACKED_CLIENTS.set(state.admission.limiter().tracked_keys() as f64);
    admitted.map_err(|rejection| ApiError::rejected(rejection, &tag))?;

    let completion = state.provider.complete(message.trim()).await?;

    tracing::info!(
        client = %tag,
        model = %completion.model,
        total_tokens = completion.usage.as_ref().map(|u| u.total_tokens),
        "Chat completion served"
    );

    Ok(Json(ChatResponse {
        response: completion.content,
        model: completion.model,
        usage: completion.usage,
    }))
}
