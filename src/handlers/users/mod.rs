// handlers/users/mod.rs - Account management

pub mod admin;
pub mod collection;
pub mod manage;
pub mod record;
pub mod stats;

pub use admin::{admin_create, admin_delete, admin_list, admin_update};
pub use collection::{create_user, list_users};
pub use manage::{profile_delete, profile_get, profile_put};
pub use record::{user_delete, user_get, user_put};
pub use stats::stats_get;

use crate::app::AppState;
use crate::auth::password::hash_password;
use crate::database::models::{Role, User};
use crate::database::NewUser;
use crate::error::ApiError;

/// Reject an email already held by an account other than `except`.
async fn ensure_email_free(state: &AppState, email: &str, except: Option<i64>) -> Result<(), ApiError> {
    if state.users.email_taken(email, except).await? {
        return Err(ApiError::bad_request("Email already exists"));
    }
    Ok(())
}

/// Hash the password and insert the account.
async fn insert_user(
    state: &AppState,
    name: String,
    email: String,
    password: &str,
    role: Role,
) -> Result<User, ApiError> {
    ensure_email_free(state, &email, None).await?;
    let password_hash = hash_password(password, state.config.security.bcrypt_cost).await?;
    let user = state
        .users
        .create(NewUser {
            name,
            email,
            password_hash,
            role,
        })
        .await?;
    tracing::info!("Created user {} with role {}", user.id, user.role);
    Ok(user)
}
