//! Typed access to the relational store.
//!
//! Handlers only see the [`Store`] trait. [`PgStore`] talks to PostgreSQL
//! through `sqlx`; [`MemoryStore`] keeps everything in process and backs the
//! test suite and `DB_URL=memory://` local runs.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::models::{NewPost, NewUser, Post, PostChanges, PostWithAuthor, User, UserChanges};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let constraint = db.constraint().unwrap_or_default().to_owned();
            if db.is_unique_violation() {
                return StoreError::UniqueViolation(constraint);
            }
            if db.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation(constraint);
            }
        }
        StoreError::Database(err)
    }
}

/// Select/insert/update/delete primitives for users and posts.
///
/// Updates and deletes return `Ok(None)` when no row matched the id.
/// Post listings are ordered newest first.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn find_user(&self, id: i32) -> Result<Option<User>, StoreError>;
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update_user(&self, id: i32, changes: UserChanges)
    -> Result<Option<User>, StoreError>;
    async fn delete_user(&self, id: i32) -> Result<Option<User>, StoreError>;

    async fn list_posts(&self) -> Result<Vec<PostWithAuthor>, StoreError>;
    async fn find_post(&self, id: i32) -> Result<Option<PostWithAuthor>, StoreError>;
    async fn list_posts_by_author(&self, author_id: i32)
    -> Result<Vec<PostWithAuthor>, StoreError>;
    async fn insert_post(&self, post: NewPost) -> Result<Post, StoreError>;
    async fn update_post(&self, id: i32, changes: PostChanges)
    -> Result<Option<Post>, StoreError>;
    async fn delete_post(&self, id: i32) -> Result<Option<Post>, StoreError>;
}
