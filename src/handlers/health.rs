use axum::{Json, extract::State, response::IntoResponse};

use crate::state::SharedState;

// GET /health
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "model": state.provider.model(),
        "trackedClients": state.admission.limiter().tracked_keys(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
