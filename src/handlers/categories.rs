// handlers/categories.rs - GET|POST /api/categories handlers

use axum::extract::State;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::app::AppState;
use crate::database::{DatabaseError, NewCategory};
use crate::error::{ApiError, ApiJson};
use crate::handlers::non_empty;
use crate::middleware::{AdminUser, ApiResponse, ApiResult};

/// Lowercase ASCII words joined by single dashes.
fn slugify(text: &str) -> String {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// GET /api/categories - public, ordered by name
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Value> {
    let categories = state.posts.list_categories().await?;
    Ok(ApiResponse::success(json!({ "categories": categories })))
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: Option<String>,
    /// Derived from `name` when absent
    pub slug: Option<String>,
    pub description: Option<String>,
}

pub async fn create_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<CreateCategoryRequest>,
) -> ApiResult<Value> {
    let Some(name) = non_empty(body.name) else {
        return Err(ApiError::bad_request("Name is required"));
    };

    let slug = slugify(non_empty(body.slug).as_deref().unwrap_or(&name));
    if slug.is_empty() {
        return Err(ApiError::bad_request("Slug must contain letters or digits"));
    }

    let category = state
        .posts
        .create_category(NewCategory {
            name,
            slug,
            description: non_empty(body.description),
        })
        .await
        .map_err(|e| match e {
            DatabaseError::UniqueViolation(_) => ApiError::conflict("Category slug already exists"),
            other => other.into(),
        })?;

    info!("Created category {} ({})", category.id, category.slug);
    Ok(ApiResponse::created(json!({ "category": category })))
}
