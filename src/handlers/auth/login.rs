// handlers/auth/login.rs - POST /api/auth/login handler

use axum::extract::State;
use serde::Deserialize;
use tracing::{info, warn};

use super::AuthResponse;
use crate::app::AppState;
use crate::auth::{issue_token, password::verify_password, Identity};
use crate::error::{ApiError, ApiJson};
use crate::handlers::non_empty;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// POST /api/auth/login - exchange email and password for a token.
///
/// Unknown email and wrong password produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let (Some(email), Some(password)) = (non_empty(body.email), non_empty(body.password)) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    let invalid = || ApiError::unauthorized("Invalid credentials");

    let Some(credentials) = state.users.find_credentials_by_email(&email).await? else {
        warn!("Login failed: unknown email");
        return Err(invalid());
    };

    if !verify_password(&password, &credentials.password_hash).await? {
        warn!("Login failed for user {}: wrong password", credentials.user.id);
        return Err(invalid());
    }

    let user = credentials.user;
    let token = issue_token(&Identity::from(&user), &state.config.security)?;
    info!("User {} logged in", user.id);

    Ok(ApiResponse::success(AuthResponse {
        user,
        token,
        message: "Login successful",
    }))
}
