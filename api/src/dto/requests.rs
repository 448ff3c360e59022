use crate::errors::ApiError;
use crate::models::{NewPost, NewUser, PostChanges, UserChanges};
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use validator::{Validate, ValidationError};

/// JSON body extractor whose rejections render as the error envelope.
///
/// The body is parsed whatever `Content-Type` says, so `curl -d` works.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await?;
        Ok(JsonBody(serde_json::from_slice(&bytes)?))
    }
}

/// Keeps `null` distinguishable from an absent field: absent -> `None`,
/// `null` -> `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(required, length(min = 1))]
    pub email: Option<String>,
    #[validate(required, length(min = 1))]
    pub name: Option<String>,
}

impl CreateUserRequest {
    pub fn into_new_user(self) -> Result<NewUser, ApiError> {
        const REQUIRED: ApiError = ApiError::Validation("Email and name are required");

        self.validate().map_err(|_| REQUIRED)?;
        match (self.email, self.name) {
            (Some(email), Some(name)) => Ok(NewUser { email, name }),
            _ => Err(REQUIRED),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "user_update_has_field"))]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

fn user_update_has_field(req: &UpdateUserRequest) -> Result<(), ValidationError> {
    if is_blank(&req.email) && is_blank(&req.name) {
        return Err(ValidationError::new("empty_update"));
    }
    Ok(())
}

impl UpdateUserRequest {
    pub fn into_changes(self) -> Result<UserChanges, ApiError> {
        self.validate().map_err(|_| {
            ApiError::Validation("At least one field (email or name) is required")
        })?;
        Ok(UserChanges {
            email: non_empty(self.email),
            name: non_empty(self.name),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[validate(required, length(min = 1))]
    pub title: Option<String>,
    pub content: Option<String>,
    pub published: Option<bool>,
    #[validate(required)]
    pub author_id: Option<i32>,
}

impl CreatePostRequest {
    pub fn into_new_post(self) -> Result<NewPost, ApiError> {
        const REQUIRED: ApiError = ApiError::Validation("Title and authorId are required");

        self.validate().map_err(|_| REQUIRED)?;
        match (self.title, self.author_id.filter(|id| *id != 0)) {
            (Some(title), Some(author_id)) => Ok(NewPost {
                title,
                content: self.content,
                published: self.published.unwrap_or(false),
                author_id,
            }),
            _ => Err(REQUIRED),
        }
    }
}

/// `content` and `published` count as set even when falsy; `title` does not.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "post_update_has_field"))]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub content: Option<Option<String>>,
    pub published: Option<bool>,
}

fn post_update_has_field(req: &UpdatePostRequest) -> Result<(), ValidationError> {
    let content_blank = req.content.as_ref().is_none_or(is_blank);
    if is_blank(&req.title) && content_blank && req.published.is_none() {
        return Err(ValidationError::new("empty_update"));
    }
    Ok(())
}

impl UpdatePostRequest {
    pub fn into_changes(self) -> Result<PostChanges, ApiError> {
        self.validate().map_err(|_| {
            ApiError::Validation(
                "At least one field (title, content, or published) is required",
            )
        })?;
        Ok(PostChanges {
            title: non_empty(self.title),
            content: self.content,
            published: self.published,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMailRequest {
    pub to: String,
    pub subject: String,
    pub message: String,
    pub html: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendQueueMessageRequest {
    pub message: String,
}
