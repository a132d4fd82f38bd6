use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub session_id: String,
}

/// Answers a query, minting a session when the client did not supply one so
/// follow-up questions keep their context.
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let session_id = match request.session_id {
        Some(id) => id,
        None => state.rag.create_session().await?,
    };

    info!(session_id = %session_id, "query received");

    let (answer, sources) = state.rag.query(&request.query, Some(&session_id)).await?;

    Ok(Json(QueryResponse {
        answer,
        sources,
        session_id,
    }))
}
