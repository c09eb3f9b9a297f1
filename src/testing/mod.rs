//! In-memory stand-ins for the database-backed stores, and a router harness.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use crate::app::{router, AppState};
use crate::auth::{issue_token, password::hash_password, Identity};
use crate::config::AppConfig;
use crate::database::models::user::{RoleCount, UserActivity};
use crate::database::models::{Category, Comment, Credentials, MigrationRecord, Post, Role, User, UserStats};
use crate::database::{
    DatabaseError, NewCategory, NewComment, NewPost, NewUser, PostChanges, PostRepository, PostVisibility,
    UserChanges, UserRepository,
};
use crate::migration::{MigrationStore, LEDGER_TABLE};

fn unavailable() -> DatabaseError {
    DatabaseError::Sqlx(sqlx::Error::PoolTimedOut)
}

#[derive(Default)]
struct UserRows {
    next_id: i64,
    rows: Vec<Credentials>,
}

/// Users kept in a vector, newest last.
#[derive(Default)]
pub struct MemoryUserRepository {
    inner: Mutex<UserRows>,
    failing: AtomicBool,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert directly, bypassing uniqueness checks.
    pub fn seed(&self, name: &str, email: &str, password_hash: &str, role: Role) -> User {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: inner.next_id,
            name: name.to_string(),
            email: email.to_string(),
            role,
            created_at: now,
            updated_at: now,
        };
        inner.rows.push(Credentials {
            user: user.clone(),
            password_hash: password_hash.to_string(),
        });
        user
    }

    /// Make every later call fail as if the database were down.
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DatabaseError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn list(&self) -> Result<Vec<User>, DatabaseError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().rev().map(|c| c.user.clone()).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        Ok(self.find_credentials_by_id(id).await?.map(|c| c.user))
    }

    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<Credentials>, DatabaseError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().find(|c| c.user.email == email).cloned())
    }

    async fn find_credentials_by_id(&self, id: i64) -> Result<Option<Credentials>, DatabaseError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().find(|c| c.user.id == id).cloned())
    }

    async fn exists_with_id_and_email(&self, id: i64, email: &str) -> Result<bool, DatabaseError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().any(|c| c.user.id == id && c.user.email == email))
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> Result<bool, DatabaseError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .any(|c| c.user.email == email && Some(c.user.id) != except))
    }

    async fn create(&self, user: NewUser) -> Result<User, DatabaseError> {
        self.check()?;
        if self.email_taken(&user.email, None).await? {
            return Err(DatabaseError::UniqueViolation("users_email_key".into()));
        }
        Ok(self.seed(&user.name, &user.email, &user.password_hash, user.role))
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, DatabaseError> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        let Some(row) = inner.rows.iter_mut().find(|c| c.user.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            row.user.name = name;
        }
        if let Some(email) = changes.email {
            row.user.email = email;
        }
        if let Some(role) = changes.role {
            row.user.role = role;
        }
        if let Some(hash) = changes.password_hash {
            row.password_hash = hash;
        }
        row.user.updated_at = Utc::now();
        Ok(Some(row.user.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.rows.len();
        inner.rows.retain(|c| c.user.id != id);
        Ok(inner.rows.len() < before)
    }

    async fn stats(&self) -> Result<UserStats, DatabaseError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        let mut by_role: HashMap<&'static str, i64> = HashMap::new();
        for row in &inner.rows {
            *by_role.entry(row.user.role.as_str()).or_default() += 1;
        }
        let mut users_by_role: Vec<RoleCount> = by_role
            .into_iter()
            .map(|(role, count)| RoleCount {
                role: role.to_string(),
                count,
            })
            .collect();
        users_by_role.sort_by(|a, b| a.role.cmp(&b.role));

        let activity = |row: &Credentials| UserActivity {
            id: row.user.id,
            name: row.user.name.clone(),
            email: row.user.email.clone(),
            count: 0,
        };

        Ok(UserStats {
            total_users: inner.rows.len() as i64,
            users_by_role,
            recent_users: inner.rows.len() as i64,
            top_users: inner.rows.iter().take(5).map(activity).collect(),
            top_commenters: inner.rows.iter().take(5).map(activity).collect(),
        })
    }
}

#[derive(Default)]
struct PostRows {
    next_id: i64,
    posts: Vec<Post>,
    categories: Vec<Category>,
    comments: Vec<Comment>,
}

/// Posts, categories and comments kept in vectors.
#[derive(Default)]
pub struct MemoryPostRepository {
    inner: Mutex<PostRows>,
}

impl MemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PostRows {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn known_categories(&self, ids: &[i64]) -> Vec<i64> {
        let mut known: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|id| self.categories.iter().any(|c| c.id == *id))
            .collect();
        known.sort_unstable();
        known.dedup();
        known
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn list_posts(&self, visibility: PostVisibility) -> Result<Vec<Post>, DatabaseError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .posts
            .iter()
            .rev()
            .filter(|p| visibility.permits(p))
            .cloned()
            .collect())
    }

    async fn find_post(&self, id: i64) -> Result<Option<Post>, DatabaseError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, DatabaseError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let created = Post {
            id: inner.next_id(),
            title: post.title,
            content: post.content,
            published: post.published,
            author_id: post.author_id,
            author_name: None,
            category_ids: inner.known_categories(&post.category_ids),
            created_at: now,
            updated_at: now,
        };
        inner.posts.push(created.clone());
        Ok(created)
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Option<Post>, DatabaseError> {
        let mut inner = self.inner.lock().unwrap();
        let category_ids = changes.category_ids.map(|ids| inner.known_categories(&ids));
        let Some(post) = inner.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(content) = changes.content {
            post.content = content;
        }
        if let Some(published) = changes.published {
            post.published = published;
        }
        if let Some(ids) = category_ids {
            post.category_ids = ids;
        }
        post.updated_at = Utc::now();
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.posts.len();
        inner.posts.retain(|p| p.id != id);
        inner.comments.retain(|c| c.post_id != id);
        Ok(inner.posts.len() < before)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, DatabaseError> {
        let inner = self.inner.lock().unwrap();
        let mut categories = inner.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category, DatabaseError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.categories.iter().any(|c| c.slug == category.slug) {
            return Err(DatabaseError::UniqueViolation("categories_slug_key".into()));
        }
        let created = Category {
            id: inner.next_id(),
            name: category.name,
            slug: category.slug,
            description: category.description,
            created_at: Utc::now(),
        };
        inner.categories.push(created.clone());
        Ok(created)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, DatabaseError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, DatabaseError> {
        let mut inner = self.inner.lock().unwrap();
        let created = Comment {
            id: inner.next_id(),
            content: comment.content,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author_name: None,
            created_at: Utc::now(),
        };
        inner.comments.push(created.clone());
        Ok(created)
    }
}

#[derive(Default)]
struct MigrationRows {
    ledger: Vec<MigrationRecord>,
    statements: Vec<String>,
}

/// Ledger and executed statements in memory. Statements containing
/// `fail_on` are rejected.
#[derive(Default)]
pub struct MemoryMigrationStore {
    inner: Mutex<MigrationRows>,
    fail_on: Option<String>,
}

impl MemoryMigrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(fragment: &str) -> Self {
        Self {
            fail_on: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    /// Statements executed successfully, in order.
    pub fn statements(&self) -> Vec<String> {
        self.inner.lock().unwrap().statements.clone()
    }

    pub fn ledger(&self) -> Vec<MigrationRecord> {
        self.inner.lock().unwrap().ledger.clone()
    }
}

#[async_trait]
impl MigrationStore for MemoryMigrationStore {
    async fn ensure_ledger(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn executed(&self) -> Result<Vec<MigrationRecord>, DatabaseError> {
        Ok(self.ledger())
    }

    async fn latest_batch(&self) -> Result<i32, DatabaseError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.ledger.iter().map(|r| r.batch).max().unwrap_or(0))
    }

    async fn execute(&self, statement: &str) -> Result<(), DatabaseError> {
        if let Some(fragment) = &self.fail_on {
            if statement.contains(fragment.as_str()) {
                return Err(DatabaseError::Sqlx(sqlx::Error::Protocol(format!(
                    "syntax error at or near \"{fragment}\""
                ))));
            }
        }
        self.inner.lock().unwrap().statements.push(statement.to_string());
        Ok(())
    }

    async fn record(&self, name: &str, batch: i32) -> Result<(), DatabaseError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.ledger.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        inner.ledger.push(MigrationRecord {
            id,
            migration: name.to_string(),
            batch,
            executed_at: Utc::now(),
        });
        Ok(())
    }

    async fn batch_names(&self, batch: i32) -> Result<Vec<String>, DatabaseError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .ledger
            .iter()
            .rev()
            .filter(|r| r.batch == batch)
            .map(|r| r.migration.clone())
            .collect())
    }

    async fn delete_batch(&self, batch: i32) -> Result<u64, DatabaseError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.ledger.len();
        inner.ledger.retain(|r| r.batch != batch);
        Ok((before - inner.ledger.len()) as u64)
    }

    async fn drop_table(&self, table: &str) -> Result<(), DatabaseError> {
        if table == LEDGER_TABLE {
            self.inner.lock().unwrap().ledger.clear();
        }
        Ok(())
    }
}

/// A router over in-memory stores.
pub struct TestApp {
    pub state: AppState,
    pub users: Arc<MemoryUserRepository>,
    pub posts: Arc<MemoryPostRepository>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig::for_tests();
        // Never connected; handlers under test do not touch the pool.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost:5432/nearnnext_test")
            .unwrap();
        let users = Arc::new(MemoryUserRepository::new());
        let posts = Arc::new(MemoryPostRepository::new());
        let state = AppState {
            config: Arc::new(config),
            pool,
            users: users.clone(),
            posts: posts.clone(),
        };
        Self { state, users, posts }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Seed an account with a real bcrypt hash and return it with a valid token.
    pub async fn user(&self, name: &str, email: &str, password: &str, role: Role) -> (User, String) {
        let hash = hash_password(password, self.state.config.security.bcrypt_cost)
            .await
            .unwrap();
        let user = self.users.seed(name, email, &hash, role);
        let token = issue_token(&Identity::from(&user), &self.state.config.security).unwrap();
        (user, token)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
