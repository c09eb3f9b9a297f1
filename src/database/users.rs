use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::database::manager::DatabaseError;
use crate::database::models::{Credentials, Role, User, UserStats};
use crate::database::models::user::{RoleCount, UserActivity};

const USER_COLUMNS: &str = "id, name, email, role, created_at, updated_at";

/// Fields for a new account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.password_hash.is_none()
    }
}

/// The credential store.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// All users, newest first.
    async fn list(&self) -> Result<Vec<User>, DatabaseError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DatabaseError>;

    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<Credentials>, DatabaseError>;

    async fn find_credentials_by_id(&self, id: i64) -> Result<Option<Credentials>, DatabaseError>;

    /// True when a row matches both the id and the email.
    async fn exists_with_id_and_email(&self, id: i64, email: &str) -> Result<bool, DatabaseError>;

    /// True when another account (not `except`) already uses `email`.
    async fn email_taken(&self, email: &str, except: Option<i64>) -> Result<bool, DatabaseError>;

    async fn create(&self, user: NewUser) -> Result<User, DatabaseError>;

    /// Returns `None` when no row has `id`.
    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, DatabaseError>;

    /// Returns `false` when no row has `id`.
    async fn delete(&self, id: i64) -> Result<bool, DatabaseError>;

    async fn stats(&self) -> Result<UserStats, DatabaseError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn list(&self) -> Result<Vec<User>, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC");
        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?;
        Ok(users)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<Credentials>, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS}, password FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, Credentials>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_credentials_by_id(&self, id: i64) -> Result<Option<Credentials>, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS}, password FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, Credentials>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn exists_with_id_and_email(&self, id: i64, email: &str) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND email = $2)",
        )
        .bind(id)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create(&self, user: NewUser) -> Result<User, DatabaseError> {
        let sql = format!(
            "INSERT INTO users (name, email, password, role) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, User>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, DatabaseError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET ");
        let mut set = qb.separated(", ");
        if let Some(name) = changes.name {
            set.push("name = ").push_bind_unseparated(name);
        }
        if let Some(email) = changes.email {
            set.push("email = ").push_bind_unseparated(email);
        }
        if let Some(role) = changes.role {
            set.push("role = ").push_bind_unseparated(role.as_str());
        }
        if let Some(hash) = changes.password_hash {
            set.push("password = ").push_bind_unseparated(hash);
        }
        set.push("updated_at = CURRENT_TIMESTAMP");
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {USER_COLUMNS}"));

        let user = qb.build_query_as::<User>().fetch_optional(&self.pool).await?;
        Ok(user)
    }

    async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self) -> Result<UserStats, DatabaseError> {
        let total_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let users_by_role = sqlx::query_as::<_, RoleCount>(
            "SELECT role, COUNT(*) AS count FROM users GROUP BY role ORDER BY role",
        )
        .fetch_all(&self.pool)
        .await?;

        let recent_users = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE created_at >= NOW() - INTERVAL '7 days'",
        )
        .fetch_one(&self.pool)
        .await?;

        let top_users = sqlx::query_as::<_, UserActivity>(
            "SELECT u.id, u.name, u.email, COUNT(p.id) AS count
             FROM users u LEFT JOIN posts p ON u.id = p.author_id
             GROUP BY u.id ORDER BY count DESC, u.id LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?;

        let top_commenters = sqlx::query_as::<_, UserActivity>(
            "SELECT u.id, u.name, u.email, COUNT(c.id) AS count
             FROM users u LEFT JOIN comments c ON u.id = c.author_id
             GROUP BY u.id ORDER BY count DESC, u.id LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(UserStats {
            total_users,
            users_by_role,
            recent_users,
            top_users,
            top_commenters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_changes_are_detected() {
        assert!(UserChanges::default().is_empty());
        let changes = UserChanges {
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
