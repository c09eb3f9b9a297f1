// handlers/posts/record.rs - GET|PUT|DELETE /api/posts/:id handlers

use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{may_modify, visible_post};
use crate::app::AppState;
use crate::database::PostChanges;
use crate::error::{ApiError, ApiJson, ApiPath};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, OptionalUser};

pub async fn post_get(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Value> {
    let post = visible_post(&state, id, viewer.as_ref()).await?;
    Ok(ApiResponse::success(json!({ "post": post })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub published: Option<bool>,
    /// Replaces every category link when present
    pub category_ids: Option<Vec<i64>>,
}

/// PUT /api/posts/:id - partial update by the author or an admin
pub async fn post_put(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdatePostRequest>,
) -> ApiResult<Value> {
    let post = visible_post(&state, id, Some(&caller)).await?;
    if !may_modify(&caller, &post) {
        return Err(ApiError::forbidden("Not allowed to modify this post"));
    }

    let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
    if blank(&body.title) || blank(&body.content) {
        return Err(ApiError::bad_request("Title and content cannot be empty"));
    }

    let changes = PostChanges {
        title: body.title,
        content: body.content,
        published: body.published,
        category_ids: body.category_ids,
    };
    if changes.title.is_none()
        && changes.content.is_none()
        && changes.published.is_none()
        && changes.category_ids.is_none()
    {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let post = state
        .posts
        .update_post(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    info!("Post {} updated by {}", id, caller.user_id);
    Ok(ApiResponse::success(json!({ "post": post })))
}

/// DELETE /api/posts/:id - by the author or an admin
pub async fn post_delete(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Value> {
    let post = visible_post(&state, id, Some(&caller)).await?;
    if !may_modify(&caller, &post) {
        return Err(ApiError::forbidden("Not allowed to modify this post"));
    }

    if !state.posts.delete_post(id).await? {
        return Err(ApiError::not_found("Post not found"));
    }

    info!("Post {} deleted by {}", id, caller.user_id);
    Ok(ApiResponse::success(json!({ "message": "Post deleted successfully" })))
}
