// handlers/auth/register.rs - POST /api/auth/register handler

use axum::extract::State;
use serde::Deserialize;
use tracing::{info, warn};

use super::AuthResponse;
use crate::app::AppState;
use crate::auth::{issue_token, password::hash_password, Identity};
use crate::database::models::Role;
use crate::database::{DatabaseError, NewUser};
use crate::error::{ApiError, ApiJson};
use crate::handlers::non_empty;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/**
 * POST /api/auth/register - Create a USER account and sign it in
 *
 * Returns 201 with `{user, token, message}`. Self-registration never grants
 * ADMIN; admins are created through `/api/users/admin`.
 */
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> ApiResult<AuthResponse> {
    let (Some(name), Some(email), Some(password)) = (
        non_empty(body.name),
        non_empty(body.email),
        non_empty(body.password),
    ) else {
        return Err(ApiError::bad_request("Name, email, and password are required"));
    };

    if state.users.email_taken(&email, None).await? {
        warn!("Registration rejected, email already registered");
        return Err(ApiError::conflict("Email already registered"));
    }

    let password_hash = hash_password(&password, state.config.security.bcrypt_cost).await?;
    let user = state
        .users
        .create(NewUser {
            name,
            email,
            password_hash,
            role: Role::User,
        })
        .await
        .map_err(|e| match e {
            DatabaseError::UniqueViolation(_) => ApiError::conflict("Email already registered"),
            other => other.into(),
        })?;

    let token = issue_token(&Identity::from(&user), &state.config.security)?;
    info!("Registered user {}", user.id);

    Ok(ApiResponse::created(AuthResponse {
        user,
        token,
        message: "Registration successful",
    }))
}
