// handlers/users/record.rs - GET|PUT|DELETE /api/users/:id handlers

use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::ensure_email_free;
use crate::app::AppState;
use crate::auth::{password::hash_password, Identity};
use crate::database::models::Role;
use crate::database::UserChanges;
use crate::error::{ApiError, ApiJson, ApiPath};
use crate::handlers::non_empty;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// Whether `caller` may edit or delete the account `id`.
fn may_modify(caller: &Identity, id: i64) -> bool {
    match caller.role {
        Role::Admin => true,
        Role::User => caller.user_id == id,
    }
}

/// GET /api/users/:id
pub async fn user_get(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Value> {
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(json!({ "user": user })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

/// PUT /api/users/:id - partial update by the account owner or an admin.
///
/// Only admins may change `role`.
pub async fn user_put(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> ApiResult<Value> {
    if !may_modify(&caller, id) {
        return Err(ApiError::forbidden("Not allowed to modify this user"));
    }
    if body.role.is_some() && caller.role != Role::Admin {
        return Err(ApiError::forbidden("Admin access required"));
    }

    let mut changes = UserChanges {
        name: non_empty(body.name),
        email: non_empty(body.email),
        role: body.role,
        password_hash: None,
    };
    if let Some(password) = non_empty(body.password) {
        changes.password_hash = Some(hash_password(&password, state.config.security.bcrypt_cost).await?);
    }
    if changes.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    if let Some(email) = &changes.email {
        ensure_email_free(&state, email, Some(id)).await?;
    }

    let user = state
        .users
        .update(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!("User {} updated by {}", id, caller.user_id);
    Ok(ApiResponse::success(json!({ "user": user })))
}

/// DELETE /api/users/:id - by the account owner or an admin
pub async fn user_delete(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Value> {
    if !may_modify(&caller, id) {
        return Err(ApiError::forbidden("Not allowed to modify this user"));
    }
    if !state.users.delete(id).await? {
        return Err(ApiError::not_found("User not found"));
    }
    info!("User {} deleted by {}", id, caller.user_id);
    Ok(ApiResponse::success(json!({ "message": "User deleted successfully" })))
}
