// handlers/posts/comments.rs - GET|POST /api/posts/:id/comments handlers

use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};

use super::visible_post;
use crate::app::AppState;
use crate::database::NewComment;
use crate::error::{ApiError, ApiJson, ApiPath};
use crate::handlers::non_empty;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, OptionalUser};

/// GET /api/posts/:id/comments - oldest first
pub async fn comments_get(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    ApiPath(post_id): ApiPath<i64>,
) -> ApiResult<Value> {
    let post = visible_post(&state, post_id, viewer.as_ref()).await?;
    let comments = state.posts.list_comments(post.id).await?;
    Ok(ApiResponse::success(json!({ "comments": comments })))
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: Option<String>,
}

pub async fn comments_post(
    State(state): State<AppState>,
    AuthUser(author): AuthUser,
    ApiPath(post_id): ApiPath<i64>,
    ApiJson(body): ApiJson<CreateCommentRequest>,
) -> ApiResult<Value> {
    let post = visible_post(&state, post_id, Some(&author)).await?;
    let Some(content) = non_empty(body.content) else {
        return Err(ApiError::bad_request("Content is required"));
    };

    let comment = state
        .posts
        .create_comment(NewComment {
            content,
            post_id: post.id,
            author_id: author.user_id,
        })
        .await?;
    Ok(ApiResponse::created(json!({ "comment": comment })))
}
