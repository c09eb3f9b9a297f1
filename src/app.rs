use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::{AppConfig, Environment};
use crate::database::{PgPostRepository, PgUserRepository, PostRepository, UserRepository};
use crate::handlers;

/// Shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: PgPool,
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
}

impl AppState {
    /// Postgres-backed repositories over one pool.
    pub fn new(config: AppConfig, pool: PgPool) -> Self {
        Self {
            config: Arc::new(config),
            users: Arc::new(PgUserRepository::new(pool.clone())),
            posts: Arc::new(PgPostRepository::new(pool.clone())),
            pool,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Public
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        .route("/api/test-db", get(handlers::system::test_db))
        .merge(auth_routes())
        .merge(user_routes())
        .merge(post_routes())
        .merge(category_routes())
        .with_state(state)
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn auth_routes() -> Router<AppState> {
    use handlers::auth;

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
}

fn user_routes() -> Router<AppState> {
    use handlers::users;

    Router::new()
        .route("/api/users", get(users::list_users).post(users::create_user))
        // Static segments take precedence over `:id`
        .route(
            "/api/users/manage",
            get(users::profile_get)
                .put(users::profile_put)
                .delete(users::profile_delete),
        )
        .route(
            "/api/users/admin",
            get(users::admin_list)
                .post(users::admin_create)
                .put(users::admin_update)
                .delete(users::admin_delete),
        )
        .route("/api/users/stats", get(users::stats_get))
        .route(
            "/api/users/:id",
            get(users::user_get)
                .put(users::user_put)
                .delete(users::user_delete),
        )
}

fn post_routes() -> Router<AppState> {
    use handlers::posts;

    Router::new()
        .route("/api/posts", get(posts::list_posts).post(posts::create_post))
        .route(
            "/api/posts/:id",
            get(posts::post_get)
                .put(posts::post_put)
                .delete(posts::post_delete),
        )
        .route(
            "/api/posts/:id/comments",
            get(posts::comments_get).post(posts::comments_post),
        )
}

fn category_routes() -> Router<AppState> {
    use handlers::categories;

    Router::new().route(
        "/api/categories",
        get(categories::list_categories).post(categories::create_category),
    )
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let security = &config.security;
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let wildcard = security.cors_origins.iter().any(|o| o == "*");
    if config.environment == Environment::Development || wildcard {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
