use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::core::errors::ApiError;
use crate::state::AppState;

/// Catalog statistics: course count plus titles.
pub async fn get_course_stats(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.rag.get_course_analytics().await))
}
