// handlers/users/admin.rs - GET|POST|PUT|DELETE /api/users/admin handlers
//
// Full user management for admins. Targets are named in the body by `userId`.

use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{ensure_email_free, insert_user};
use crate::app::AppState;
use crate::auth::password::hash_password;
use crate::database::models::Role;
use crate::database::UserChanges;
use crate::error::{ApiError, ApiJson};
use crate::handlers::non_empty;
use crate::middleware::{AdminUser, ApiResponse, ApiResult};

pub async fn admin_list(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Value> {
    let users = state.users.list().await?;
    Ok(ApiResponse::success(json!({ "users": users })))
}

#[derive(Debug, Deserialize)]
pub struct AdminCreateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

pub async fn admin_create(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<AdminCreateRequest>,
) -> ApiResult<Value> {
    let (Some(name), Some(email), Some(password), Some(role)) = (
        non_empty(body.name),
        non_empty(body.email),
        non_empty(body.password),
        body.role,
    ) else {
        return Err(ApiError::bad_request("All fields are required"));
    };

    let user = insert_user(&state, name, email, &password, role).await?;
    Ok(ApiResponse::created(json!({
        "user": user,
        "message": "User created successfully"
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateRequest {
    pub user_id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    /// Left unchanged when absent or blank
    pub password: Option<String>,
}

pub async fn admin_update(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(body): ApiJson<AdminUpdateRequest>,
) -> ApiResult<Value> {
    let (Some(user_id), Some(name), Some(email), Some(role)) = (
        body.user_id,
        non_empty(body.name),
        non_empty(body.email),
        body.role,
    ) else {
        return Err(ApiError::bad_request("Missing required fields"));
    };

    ensure_email_free(&state, &email, Some(user_id)).await?;

    let password_hash = match non_empty(body.password) {
        Some(password) => Some(hash_password(&password, state.config.security.bcrypt_cost).await?),
        None => None,
    };

    let user = state
        .users
        .update(
            user_id,
            UserChanges {
                name: Some(name),
                email: Some(email),
                role: Some(role),
                password_hash,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!("Admin {} updated user {}", admin.user_id, user_id);
    Ok(ApiResponse::success(json!({
        "user": user,
        "message": "User updated successfully"
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDeleteRequest {
    pub user_id: Option<i64>,
}

pub async fn admin_delete(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(body): ApiJson<AdminDeleteRequest>,
) -> ApiResult<Value> {
    let Some(user_id) = body.user_id else {
        return Err(ApiError::bad_request("Missing userId"));
    };

    if !state.users.delete(user_id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    info!("Admin {} deleted user {}", admin.user_id, user_id);
    Ok(ApiResponse::success(json!({ "message": "User deleted successfully" })))
}
