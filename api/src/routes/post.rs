use super::parse_id;
use crate::{
    AppState,
    db::StoreError,
    dto::{ApiResponse, CreatePostRequest, JsonBody, UpdatePostRequest},
    errors::ApiError,
    models::{Post, PostWithAuthor},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

const INVALID_ID: &str = "Invalid post ID";
const NOT_FOUND: &str = "Post not found";
const AUTHOR_NOT_FOUND: &str = "Author not found";

/// GET /api/posts
/// Every post with its author, newest first.
pub async fn list_posts(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PostWithAuthor>>>, ApiError> {
    let posts = state
        .store
        .list_posts()
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch posts", e))?;

    Ok(Json(ApiResponse::ok(posts)))
}

/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PostWithAuthor>>, ApiError> {
    let id = parse_id(&id, INVALID_ID)?;

    let post = state
        .store
        .find_post(id)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch post", e))?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;

    Ok(Json(ApiResponse::ok(post)))
}

/// GET /api/posts/user/:userId
/// An author without posts gets an empty list, not a 404.
pub async fn list_posts_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<PostWithAuthor>>>, ApiError> {
    let user_id = parse_id(&user_id, "Invalid user ID")?;

    let posts = state
        .store
        .list_posts_by_author(user_id)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch user posts", e))?;

    Ok(Json(ApiResponse::ok(posts)))
}

/// POST /api/posts
/// Body: { "title": "...", "content"?: "...", "published"?: bool, "authorId": 1 }
pub async fn create_post(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreatePostRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Post>>), ApiError> {
    const FAILED: &str = "Failed to create post";

    let new_post = payload.into_new_post()?;

    state
        .store
        .find_user(new_post.author_id)
        .await
        .map_err(|e| ApiError::upstream(FAILED, e))?
        .ok_or(ApiError::NotFound(AUTHOR_NOT_FOUND))?;

    let post = state
        .store
        .insert_post(new_post)
        .await
        .map_err(|e| match e {
            // Author removed between the check and the insert
            StoreError::ForeignKeyViolation(_) => ApiError::NotFound(AUTHOR_NOT_FOUND),
            e => ApiError::upstream(FAILED, e),
        })?;

    info!("Post created: {} by user {}", post.id, post.author_id);

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(post))))
}

/// PUT /api/posts/:id
/// Body: { "title"?: "...", "content"?: "...", "published"?: bool }
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdatePostRequest>,
) -> Result<Json<ApiResponse<Post>>, ApiError> {
    let id = parse_id(&id, INVALID_ID)?;
    let changes = payload.into_changes()?;

    let post = state
        .store
        .update_post(id, changes)
        .await
        .map_err(|e| ApiError::upstream("Failed to update post", e))?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;

    info!("Post updated: {}", post.id);

    Ok(Json(ApiResponse::ok(post)))
}

/// DELETE /api/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let id = parse_id(&id, INVALID_ID)?;

    state
        .store
        .delete_post(id)
        .await
        .map_err(|e| ApiError::upstream("Failed to delete post", e))?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;

    info!("Post deleted: {}", id);

    Ok(Json(ApiResponse::message("Post deleted successfully")))
}
