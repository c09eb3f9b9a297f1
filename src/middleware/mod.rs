pub mod auth;
pub mod response;

pub use auth::{verify, AdminUser, AuthFailure, AuthUser, OptionalUser};
pub use response::{ApiResponse, ApiResult};
