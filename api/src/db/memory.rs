use super::{Store, StoreError};
use crate::models::{
    AuthorSummary, NewPost, NewUser, Post, PostChanges, PostWithAuthor, User, UserChanges,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::atomic::{AtomicI32, Ordering};

const EMAIL_CONSTRAINT: &str = "users_email_unique";
const AUTHOR_CONSTRAINT: &str = "posts_author_id_fkey";

/// In-process store with the same constraints as the relational schema:
/// unique user emails and posts referencing existing users.
///
/// Lock order is always `email_index` before `users` to keep concurrent
/// inserts and updates from deadlocking.
pub struct MemoryStore {
    users: DashMap<i32, User>,
    posts: DashMap<i32, Post>,
    email_index: DashMap<String, i32>,
    next_user_id: AtomicI32,
    next_post_id: AtomicI32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            posts: DashMap::new(),
            email_index: DashMap::new(),
            next_user_id: AtomicI32::new(1),
            next_post_id: AtomicI32::new(1),
        }
    }

    fn author_of(&self, post: &Post) -> Option<AuthorSummary> {
        self.users.get(&post.author_id).map(|user| AuthorSummary {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        })
    }

    fn joined<I>(&self, posts: I) -> Vec<PostWithAuthor>
    where
        I: IntoIterator<Item = Post>,
    {
        let mut joined: Vec<PostWithAuthor> = posts
            .into_iter()
            .map(|post| {
                let author = self.author_of(&post);
                PostWithAuthor::new(post, author)
            })
            .collect();

        // Newest first, id breaks ties
        joined.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        joined
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    async fn find_user(&self, id: i32) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn insert_user(&self, new: NewUser) -> Result<User, StoreError> {
        match self.email_index.entry(new.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::UniqueViolation(EMAIL_CONSTRAINT.into())),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let user = User {
                    id: self.next_user_id.fetch_add(1, Ordering::SeqCst),
                    email: new.email,
                    name: new.name,
                    created_at: now,
                    updated_at: now,
                };
                slot.insert(user.id);
                self.users.insert(user.id, user.clone());
                Ok(user)
            }
        }
    }

    async fn update_user(
        &self,
        id: i32,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let Some(current) = self.users.get(&id).map(|user| user.clone()) else {
            return Ok(None);
        };

        let new_email = changes
            .email
            .filter(|email| *email != current.email);

        if let Some(email) = &new_email {
            match self.email_index.entry(email.clone()) {
                Entry::Occupied(_) => {
                    return Err(StoreError::UniqueViolation(EMAIL_CONSTRAINT.into()));
                }
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
        }

        if new_email.is_some() {
            self.email_index
                .remove_if(&current.email, |_, owner| *owner == id);
        }

        let Some(mut user) = self.users.get_mut(&id) else {
            // Deleted while we were claiming the new email
            if let Some(email) = &new_email {
                self.email_index.remove_if(email, |_, owner| *owner == id);
            }
            return Ok(None);
        };

        if let Some(email) = new_email {
            user.email = email;
        }
        if let Some(name) = changes.name {
            user.name = name;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i32) -> Result<Option<User>, StoreError> {
        if self.posts.iter().any(|post| post.author_id == id) {
            return Err(StoreError::ForeignKeyViolation(AUTHOR_CONSTRAINT.into()));
        }

        let Some((_, user)) = self.users.remove(&id) else {
            return Ok(None);
        };
        self.email_index.remove_if(&user.email, |_, owner| *owner == id);
        Ok(Some(user))
    }

    async fn list_posts(&self) -> Result<Vec<PostWithAuthor>, StoreError> {
        let posts: Vec<Post> = self.posts.iter().map(|e| e.value().clone()).collect();
        Ok(self.joined(posts))
    }

    async fn find_post(&self, id: i32) -> Result<Option<PostWithAuthor>, StoreError> {
        let post = self.posts.get(&id).map(|post| post.clone());
        Ok(post.map(|post| {
            let author = self.author_of(&post);
            PostWithAuthor::new(post, author)
        }))
    }

    async fn list_posts_by_author(
        &self,
        author_id: i32,
    ) -> Result<Vec<PostWithAuthor>, StoreError> {
        let posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|post| post.author_id == author_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(self.joined(posts))
    }

    async fn insert_post(&self, new: NewPost) -> Result<Post, StoreError> {
        if !self.users.contains_key(&new.author_id) {
            return Err(StoreError::ForeignKeyViolation(AUTHOR_CONSTRAINT.into()));
        }

        let now = Utc::now();
        let post = Post {
            id: self.next_post_id.fetch_add(1, Ordering::SeqCst),
            title: new.title,
            content: new.content,
            published: new.published,
            author_id: new.author_id,
            created_at: now,
            updated_at: now,
        };
        self.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post(
        &self,
        id: i32,
        changes: PostChanges,
    ) -> Result<Option<Post>, StoreError> {
        let Some(mut post) = self.posts.get_mut(&id) else {
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
        post.updated_at = Utc::now();

        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: i32) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.remove(&id).map(|(_, post)| post))
    }
}
