// handlers/auth/mod.rs - Token acquisition (public)

pub mod login;
pub mod register;

pub use login::login;
pub use register::register;

use serde::Serialize;

use crate::database::models::User;

/// Body of a successful register or login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub message: &'static str,
}
