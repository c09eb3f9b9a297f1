// handlers/users/stats.rs - GET /api/users/stats handler

use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{AdminUser, ApiResponse, ApiResult};

/// Totals, per-role counts, signups of the last 7 days, top posters and commenters
pub async fn stats_get(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Value> {
    let stats = state.users.stats().await?;
    Ok(ApiResponse::success(json!({ "stats": stats })))
}
