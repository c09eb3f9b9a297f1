// handlers/users/collection.rs - GET|POST /api/users handlers

use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};

use super::insert_user;
use crate::app::AppState;
use crate::database::models::Role;
use crate::error::{ApiError, ApiJson};
use crate::handlers::non_empty;
use crate::middleware::{AdminUser, ApiResponse, ApiResult, AuthUser};

/// GET /api/users - all users, newest first
pub async fn list_users(State(state): State<AppState>, _caller: AuthUser) -> ApiResult<Value> {
    let users = state.users.list().await?;
    Ok(ApiResponse::success(json!({ "users": users })))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

/// POST /api/users - create an account; role defaults to USER
pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> ApiResult<Value> {
    let (Some(name), Some(email), Some(password)) = (
        non_empty(body.name),
        non_empty(body.email),
        non_empty(body.password),
    ) else {
        return Err(ApiError::bad_request("Name, email, and password are required"));
    };

    let user = insert_user(&state, name, email, &password, body.role.unwrap_or_default()).await?;
    Ok(ApiResponse::created(json!({ "user": user })))
}
