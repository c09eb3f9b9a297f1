pub mod manager;
pub mod models;
pub mod posts;
pub mod users;

pub use manager::{DatabaseError, DatabaseManager, Diagnostics};
pub use posts::{NewCategory, NewComment, NewPost, PgPostRepository, PostChanges, PostRepository, PostVisibility};
pub use users::{NewUser, PgUserRepository, UserChanges, UserRepository};
