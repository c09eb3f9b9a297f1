// handlers/system.rs - Service info and database probes (public)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult};

/// GET / - service name, version and route overview
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "NearnNext API",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "endpoints": {
            "health": "/health (public)",
            "auth": "/api/auth/register, /api/auth/login (public)",
            "users": "/api/users[/:id], /api/users/manage (auth), /api/users/admin, /api/users/stats (admin)",
            "posts": "/api/posts[/:id][/comments] (public read, auth write)",
            "categories": "/api/categories (public read, admin write)",
        }
    }))
}

/// GET /health - 200 when the database answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "error": "Database unavailable"
                })),
            )
        }
    }
}

/// GET /api/test-db - tables of the public schema with their row counts
pub async fn test_db(State(state): State<AppState>) -> ApiResult<Value> {
    let diagnostics = DatabaseManager::diagnostics(&state.pool).await?;
    Ok(ApiResponse::success(json!({
        "status": "success",
        "message": "Database connected successfully",
        "timestamp": chrono::Utc::now(),
        "database": diagnostics.database,
        "tables": diagnostics.tables,
        "table_counts": diagnostics.table_counts,
    })))
}
