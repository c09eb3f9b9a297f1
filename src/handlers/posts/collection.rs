// handlers/posts/collection.rs - GET|POST /api/posts handlers

use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::visibility_for;
use crate::app::AppState;
use crate::database::NewPost;
use crate::error::{ApiError, ApiJson};
use crate::handlers::non_empty;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, OptionalUser};

/// GET /api/posts - posts visible to the caller, newest first
pub async fn list_posts(State(state): State<AppState>, OptionalUser(viewer): OptionalUser) -> ApiResult<Value> {
    let posts = state.posts.list_posts(visibility_for(viewer.as_ref())).await?;
    Ok(ApiResponse::success(json!({ "posts": posts })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

/// POST /api/posts - create a post authored by the caller
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(author): AuthUser,
    ApiJson(body): ApiJson<CreatePostRequest>,
) -> ApiResult<Value> {
    let (Some(title), Some(content)) = (non_empty(body.title), non_empty(body.content)) else {
        return Err(ApiError::bad_request("Title and content are required"));
    };

    let post = state
        .posts
        .create_post(NewPost {
            title,
            content,
            published: body.published,
            author_id: author.user_id,
            category_ids: body.category_ids,
        })
        .await?;

    info!("User {} created post {}", author.user_id, post.id);
    Ok(ApiResponse::created(json!({ "post": post })))
}
