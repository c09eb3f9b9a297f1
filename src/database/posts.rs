use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::warn;

use crate::database::manager::DatabaseError;
use crate::database::models::{Category, Comment, Post};

const POST_SELECT: &str = "SELECT p.id, p.title, p.content, p.published, p.author_id, \
     u.name AS author_name, \
     COALESCE(array_agg(pc.category_id ORDER BY pc.category_id) \
         FILTER (WHERE pc.category_id IS NOT NULL), '{}'::BIGINT[]) AS category_ids, \
     p.created_at, p.updated_at \
     FROM posts p \
     LEFT JOIN users u ON p.author_id = u.id \
     LEFT JOIN post_categories pc ON pc.post_id = p.id";

const POST_GROUP: &str = " GROUP BY p.id, u.name";

/// Which posts a viewer may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostVisibility {
    /// Anonymous viewers
    Published,
    /// Signed-in users see their own drafts too
    PublishedOrAuthoredBy(i64),
    /// Admins
    All,
}

impl PostVisibility {
    pub fn permits(&self, post: &Post) -> bool {
        match self {
            PostVisibility::Published => post.published,
            PostVisibility::PublishedOrAuthoredBy(user_id) => {
                post.published || post.author_id == *user_id
            }
            PostVisibility::All => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub published: bool,
    pub author_id: i64,
    pub category_ids: Vec<i64>,
}

/// Partial post update. `category_ids: Some(..)` replaces every link.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub published: Option<bool>,
    pub category_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub post_id: i64,
    pub author_id: i64,
}

/// The resource store: posts, their category links, categories and comments.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Posts the viewer may see, newest first.
    async fn list_posts(&self, visibility: PostVisibility) -> Result<Vec<Post>, DatabaseError>;

    async fn find_post(&self, id: i64) -> Result<Option<Post>, DatabaseError>;

    /// Inserts the post and links the categories that exist. Unknown ids are skipped.
    async fn create_post(&self, post: NewPost) -> Result<Post, DatabaseError>;

    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Option<Post>, DatabaseError>;

    async fn delete_post(&self, id: i64) -> Result<bool, DatabaseError>;

    async fn list_categories(&self) -> Result<Vec<Category>, DatabaseError>;

    async fn create_category(&self, category: NewCategory) -> Result<Category, DatabaseError>;

    /// Comments of a post, oldest first.
    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, DatabaseError>;

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, DatabaseError>;
}

#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn fetch_post(conn: &mut PgConnection, id: i64) -> Result<Option<Post>, DatabaseError> {
    let sql = format!("{POST_SELECT} WHERE p.id = $1{POST_GROUP}");
    let post = sqlx::query_as::<_, Post>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(post)
}

async fn link_categories(
    conn: &mut PgConnection,
    post_id: i64,
    category_ids: &[i64],
) -> Result<(), DatabaseError> {
    for category_id in category_ids {
        let result = sqlx::query(
            "INSERT INTO post_categories (post_id, category_id)
             SELECT $1, id FROM categories WHERE id = $2
             ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(category_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            warn!("Skipping category {} for post {}: unknown or already linked", category_id, post_id);
        }
    }
    Ok(())
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn list_posts(&self, visibility: PostVisibility) -> Result<Vec<Post>, DatabaseError> {
        let mut qb = QueryBuilder::<Postgres>::new(POST_SELECT);
        match visibility {
            PostVisibility::Published => {
                qb.push(" WHERE p.published = TRUE");
            }
            PostVisibility::PublishedOrAuthoredBy(user_id) => {
                qb.push(" WHERE p.published = TRUE OR p.author_id = ").push_bind(user_id);
            }
            PostVisibility::All => {}
        }
        qb.push(POST_GROUP);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC");

        let posts = qb.build_query_as::<Post>().fetch_all(&self.pool).await?;
        Ok(posts)
    }

    async fn find_post(&self, id: i64) -> Result<Option<Post>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_post(&mut conn, id).await
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (title, content, published, author_id) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.published)
        .bind(post.author_id)
        .fetch_one(&mut *tx)
        .await?;

        link_categories(&mut tx, id, &post.category_ids).await?;

        let created = fetch_post(&mut tx, id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("post {}", id)))?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Option<Post>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE posts SET ");
        let mut set = qb.separated(", ");
        if let Some(title) = changes.title {
            set.push("title = ").push_bind_unseparated(title);
        }
        if let Some(content) = changes.content {
            set.push("content = ").push_bind_unseparated(content);
        }
        if let Some(published) = changes.published {
            set.push("published = ").push_bind_unseparated(published);
        }
        set.push("updated_at = CURRENT_TIMESTAMP");
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(category_ids) = changes.category_ids {
            sqlx::query("DELETE FROM post_categories WHERE post_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            link_categories(&mut tx, id, &category_ids).await?;
        }

        let updated = fetch_post(&mut tx, id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_post(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, DatabaseError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, created_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category, DatabaseError> {
        let created = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug, description) VALUES ($1, $2, $3)
             RETURNING id, name, slug, description, created_at",
        )
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, DatabaseError> {
        let comments = sqlx::query_as::<_, Comment>(
            "SELECT c.id, c.content, c.post_id, c.author_id, u.name AS author_name, c.created_at
             FROM comments c LEFT JOIN users u ON c.author_id = u.id
             WHERE c.post_id = $1
             ORDER BY c.created_at, c.id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, DatabaseError> {
        let created = sqlx::query_as::<_, Comment>(
            "WITH inserted AS (
                 INSERT INTO comments (content, post_id, author_id) VALUES ($1, $2, $3)
                 RETURNING id, content, post_id, author_id, created_at
             )
             SELECT i.id, i.content, i.post_id, i.author_id, u.name AS author_name, i.created_at
             FROM inserted i LEFT JOIN users u ON i.author_id = u.id",
        )
        .bind(&comment.content)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(author_id: i64, published: bool) -> Post {
        Post {
            id: 1,
            title: "t".into(),
            content: "c".into(),
            published,
            author_id,
            author_name: None,
            category_ids: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn drafts_are_visible_to_author_and_admin_only() {
        let draft = post(7, false);
        assert!(!PostVisibility::Published.permits(&draft));
        assert!(!PostVisibility::PublishedOrAuthoredBy(8).permits(&draft));
        assert!(PostVisibility::PublishedOrAuthoredBy(7).permits(&draft));
        assert!(PostVisibility::All.permits(&draft));
        assert!(PostVisibility::Published.permits(&post(7, true)));
    }
}
