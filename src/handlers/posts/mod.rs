// handlers/posts/mod.rs - Posts and their comments

pub mod collection;
pub mod comments;
pub mod record;

pub use collection::{create_post, list_posts};
pub use comments::{comments_get, comments_post};
pub use record::{post_delete, post_get, post_put};

use crate::app::AppState;
use crate::auth::Identity;
use crate::database::models::{Post, Role};
use crate::database::PostVisibility;
use crate::error::ApiError;

/// Anonymous callers see published posts, users add their own drafts, admins see all.
fn visibility_for(viewer: Option<&Identity>) -> PostVisibility {
    match viewer {
        None => PostVisibility::Published,
        Some(identity) => match identity.role {
            Role::Admin => PostVisibility::All,
            Role::User => PostVisibility::PublishedOrAuthoredBy(identity.user_id),
        },
    }
}

fn may_modify(identity: &Identity, post: &Post) -> bool {
    match identity.role {
        Role::Admin => true,
        Role::User => post.author_id == identity.user_id,
    }
}

/// Load a post, answering 404 for drafts the viewer may not see.
async fn visible_post(state: &AppState, id: i64, viewer: Option<&Identity>) -> Result<Post, ApiError> {
    match state.posts.find_post(id).await? {
        Some(post) if visibility_for(viewer).permits(&post) => Ok(post),
        _ => Err(ApiError::not_found("Post not found")),
    }
}
