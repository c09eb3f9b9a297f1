pub mod migration;
pub mod post;
pub mod user;

pub use migration::MigrationRecord;
pub use post::{Category, Comment, Post};
pub use user::{Credentials, Role, RoleParseError, User, UserStats};
