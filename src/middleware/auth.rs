use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::{debug, warn};

use crate::app::AppState;
use crate::auth::{decode_token, Identity};
use crate::database::models::Role;
use crate::database::{DatabaseError, UserRepository};
use crate::error::ApiError;

/// Why a request could not be authenticated
#[derive(Debug)]
pub enum AuthFailure {
    /// Missing or malformed header, bad signature, expired token, or unknown account
    Unauthenticated,
    /// The credential store could not be queried
    Internal(DatabaseError),
}

impl From<DatabaseError> for AuthFailure {
    fn from(err: DatabaseError) -> Self {
        AuthFailure::Internal(err)
    }
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Unauthenticated => ApiError::unauthorized("Authentication required"),
            AuthFailure::Internal(err) => ApiError::from(err),
        }
    }
}

/// Extract the bearer token from the Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Option<&str> {
    let auth_str = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?;
    if token.trim().is_empty() {
        return None;
    }
    Some(token)
}

/// Resolve the caller of a request.
///
/// The token must carry a valid HS256 signature, be unexpired, and name an
/// account whose id and email still match a stored row. The identity returned
/// is the one inside the token.
pub async fn verify(
    headers: &HeaderMap,
    users: &dyn UserRepository,
    secret: &str,
) -> Result<Identity, AuthFailure> {
    let token = extract_jwt_from_headers(headers).ok_or_else(|| {
        debug!("Request without a bearer token");
        AuthFailure::Unauthenticated
    })?;

    let claims = decode_token(token, secret).map_err(|e| {
        warn!("Rejected token: {}", e);
        AuthFailure::Unauthenticated
    })?;

    if !users.exists_with_id_and_email(claims.user_id, &claims.email).await? {
        warn!("Token for user {} no longer matches an account", claims.user_id);
        return Err(AuthFailure::Unauthenticated);
    }

    Ok(claims.identity())
}

async fn verify_request(parts: &Parts, state: &AppState) -> Result<Identity, AuthFailure> {
    verify(&parts.headers, state.users.as_ref(), &state.config.security.jwt_secret).await
}

/// Any signed-in user
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(AuthUser(verify_request(parts, state).await?))
    }
}

/// A signed-in user whose token carries the ADMIN role
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = verify_request(parts, state).await?;
        match identity.role {
            Role::Admin => Ok(AdminUser(identity)),
            Role::User => {
                debug!("User {} denied admin access", identity.user_id);
                Err(ApiError::forbidden("Admin access required"))
            }
        }
    }
}

/// The caller if authenticated, otherwise anonymous
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<Identity>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match verify_request(parts, state).await {
            Ok(identity) => Ok(OptionalUser(Some(identity))),
            Err(AuthFailure::Unauthenticated) => Ok(OptionalUser(None)),
            Err(AuthFailure::Internal(err)) => Err(err.into()),
        }
    }
}
