mod post;
mod user;

pub use post::{AuthorSummary, NewPost, Post, PostChanges, PostWithAuthor};
pub use user::{NewUser, User, UserChanges};
