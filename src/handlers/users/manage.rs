// handlers/users/manage.rs - GET|PUT|DELETE /api/users/manage handlers
//
// Self-service profile for the caller of the request.

use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::ensure_email_free;
use crate::app::AppState;
use crate::auth::password::{hash_password, verify_password};
use crate::database::models::Credentials;
use crate::database::UserChanges;
use crate::error::{ApiError, ApiJson};
use crate::handlers::non_empty;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

async fn credentials(state: &AppState, id: i64) -> Result<Credentials, ApiError> {
    state
        .users
        .find_credentials_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// GET /api/users/manage - the caller's own account
pub async fn profile_get(State(state): State<AppState>, AuthUser(caller): AuthUser) -> ApiResult<Value> {
    let user = state
        .users
        .find_by_id(caller.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ApiResponse::success(json!({ "user": user })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// PUT /api/users/manage - change name and email, and the password when
/// `newPassword` is given together with the correct `currentPassword`.
pub async fn profile_put(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Value> {
    let (Some(name), Some(email)) = (non_empty(body.name), non_empty(body.email)) else {
        return Err(ApiError::bad_request("Name and email are required"));
    };

    ensure_email_free(&state, &email, Some(caller.user_id)).await?;

    let mut changes = UserChanges {
        name: Some(name),
        email: Some(email),
        ..Default::default()
    };

    if let Some(new_password) = non_empty(body.new_password) {
        let Some(current_password) = non_empty(body.current_password) else {
            return Err(ApiError::bad_request("Current password is required to change password"));
        };
        let stored = credentials(&state, caller.user_id).await?;
        if !verify_password(&current_password, &stored.password_hash).await? {
            warn!("User {} gave a wrong current password", caller.user_id);
            return Err(ApiError::bad_request("Current password is incorrect"));
        }
        changes.password_hash = Some(hash_password(&new_password, state.config.security.bcrypt_cost).await?);
    }

    let user = state
        .users
        .update(caller.user_id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::success(json!({
        "user": user,
        "message": "Profile updated successfully"
    })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: Option<String>,
}

/// DELETE /api/users/manage - delete the caller's account after password confirmation.
/// Owned posts and comments go with it.
pub async fn profile_delete(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiJson(body): ApiJson<DeleteAccountRequest>,
) -> ApiResult<Value> {
    let Some(password) = non_empty(body.password) else {
        return Err(ApiError::bad_request("Password is required to delete account"));
    };

    let stored = credentials(&state, caller.user_id).await?;
    if !verify_password(&password, &stored.password_hash).await? {
        return Err(ApiError::bad_request("Password is incorrect"));
    }

    state.users.delete(caller.user_id).await?;
    info!("User {} deleted their account", caller.user_id);
    Ok(ApiResponse::success(json!({ "message": "Account deleted successfully" })))
}
