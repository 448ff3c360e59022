use super::{Store, StoreError};
use crate::models::{
    AuthorSummary, NewPost, NewUser, Post, PostChanges, PostWithAuthor, User, UserChanges,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, postgres::PgPoolOptions};
use tracing::info;

const USER_COLUMNS: &str = "id, email, name, created_at, updated_at";
const POST_COLUMNS: &str = "id, title, content, published, author_id, created_at, updated_at";
const POST_WITH_AUTHOR: &str = "SELECT p.id, p.title, p.content, p.published, \
     p.created_at, p.updated_at, u.id AS author_id, u.name AS author_name, \
     u.email AS author_email \
     FROM posts p LEFT JOIN users u ON p.author_id = u.id";

/// Flat row of the post/author left join.
#[derive(Debug, FromRow)]
struct PostAuthorRow {
    id: i32,
    title: String,
    content: Option<String>,
    published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_id: Option<i32>,
    author_name: Option<String>,
    author_email: Option<String>,
}

impl From<PostAuthorRow> for PostWithAuthor {
    fn from(row: PostAuthorRow) -> Self {
        let author = match (row.author_id, row.author_name, row.author_email) {
            (Some(id), Some(name), Some(email)) => Some(AuthorSummary { id, name, email }),
            _ => None,
        };
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            published: row.published,
            created_at: row.created_at,
            updated_at: row.updated_at,
            author,
        }
    }
}

/// `UPDATE users` touching only the columns present in `changes`.
fn user_update(id: i32, changes: UserChanges) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new("UPDATE users SET updated_at = now()");
    if let Some(email) = changes.email {
        query.push(", email = ").push_bind(email);
    }
    if let Some(name) = changes.name {
        query.push(", name = ").push_bind(name);
    }
    query
        .push(" WHERE id = ")
        .push_bind(id)
        .push(" RETURNING ")
        .push(USER_COLUMNS);
    query
}

fn post_update(id: i32, changes: PostChanges) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new("UPDATE posts SET updated_at = now()");
    if let Some(title) = changes.title {
        query.push(", title = ").push_bind(title);
    }
    if let Some(content) = changes.content {
        query.push(", content = ").push_bind(content);
    }
    if let Some(published) = changes.published {
        query.push(", published = ").push_bind(published);
    }
    query
        .push(" WHERE id = ")
        .push_bind(id)
        .push(" RETURNING ")
        .push(POST_COLUMNS);
    query
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users"))
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn find_user(&self, id: i32) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.email)
        .bind(user.name)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user(
        &self,
        id: i32,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let mut query = user_update(id, changes);
        let user = query
            .build_query_as::<User>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: i32) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_posts(&self) -> Result<Vec<PostWithAuthor>, StoreError> {
        let rows = sqlx::query_as::<_, PostAuthorRow>(&format!(
            "{POST_WITH_AUTHOR} ORDER BY p.created_at DESC, p.id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PostWithAuthor::from).collect())
    }

    async fn find_post(&self, id: i32) -> Result<Option<PostWithAuthor>, StoreError> {
        let row = sqlx::query_as::<_, PostAuthorRow>(&format!(
            "{POST_WITH_AUTHOR} WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PostWithAuthor::from))
    }

    async fn list_posts_by_author(
        &self,
        author_id: i32,
    ) -> Result<Vec<PostWithAuthor>, StoreError> {
        let rows = sqlx::query_as::<_, PostAuthorRow>(&format!(
            "{POST_WITH_AUTHOR} WHERE p.author_id = $1 ORDER BY p.created_at DESC, p.id DESC"
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PostWithAuthor::from).collect())
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (title, content, published, author_id) \
             VALUES ($1, $2, $3, $4) RETURNING {POST_COLUMNS}"
        ))
        .bind(post.title)
        .bind(post.content)
        .bind(post.published)
        .bind(post.author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    async fn update_post(
        &self,
        id: i32,
        changes: PostChanges,
    ) -> Result<Option<Post>, StoreError> {
        let mut query = post_update(id, changes);
        let post = query
            .build_query_as::<Post>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn delete_post(&self, id: i32) -> Result<Option<Post>, StoreError> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "DELETE FROM posts WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_update_sets_only_given_columns() {
        let query = user_update(
            7,
            UserChanges {
                email: None,
                name: Some("B".into()),
            },
        );
        assert_eq!(
            query.sql(),
            "UPDATE users SET updated_at = now(), name = $1 WHERE id = $2 \
             RETURNING id, email, name, created_at, updated_at"
        );
    }

    #[test]
    fn post_update_can_null_content() {
        let query = post_update(
            3,
            PostChanges {
                title: None,
                content: Some(None),
                published: Some(true),
            },
        );
        let sql = query.sql();
        assert!(sql.contains(", content = $1, published = $2 WHERE id = $3"), "{sql}");
        assert!(!sql.contains("title ="), "{sql}");
    }

    #[test]
    fn missing_author_columns_become_null_author() {
        let now = Utc::now();
        let post = PostWithAuthor::from(PostAuthorRow {
            id: 1,
            title: "t".into(),
            content: None,
            published: false,
            created_at: now,
            updated_at: now,
            author_id: None,
            author_name: None,
            author_email: None,
        });
        assert!(post.author.is_none());
    }
}
