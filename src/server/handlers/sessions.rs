use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn create_session(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let session_id = state.rag.create_session().await?;
    info!(session_id = %session_id, "session created");
    Ok(Json(json!({ "session_id": session_id })))
}

/// Wipes a session's history; the session id stays usable.
pub async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.rag.clear_session(&session_id).await?;
    info!(session_id = %session_id, "session cleared");
    Ok(Json(json!({ "session_id": session_id, "cleared": true })))
}
