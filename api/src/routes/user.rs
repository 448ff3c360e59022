use super::parse_id;
use crate::{
    AppState,
    db::StoreError,
    dto::{ApiResponse, CreateUserRequest, JsonBody, UpdateUserRequest},
    errors::ApiError,
    models::User,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

const INVALID_ID: &str = "Invalid user ID";
const NOT_FOUND: &str = "User not found";
const EMAIL_TAKEN: &str = "Email already exists";

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let users = state
        .store
        .list_users()
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch users", e))?;

    Ok(Json(ApiResponse::ok(users)))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let id = parse_id(&id, INVALID_ID)?;

    let user = state
        .store
        .find_user(id)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch user", e))?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;

    Ok(Json(ApiResponse::ok(user)))
}

/// POST /api/users
/// Body: { "email": "...", "name": "..." }
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let new_user = payload.into_new_user()?;

    let user = state
        .store
        .insert_user(new_user)
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(_) => ApiError::Conflict(EMAIL_TAKEN),
            e => ApiError::upstream("Failed to create user", e),
        })?;

    info!("User created: {} <{}>", user.id, user.email);

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(user))))
}

/// PUT /api/users/:id
/// Body: { "email"?: "...", "name"?: "..." }
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let id = parse_id(&id, INVALID_ID)?;
    let changes = payload.into_changes()?;

    let user = state
        .store
        .update_user(id, changes)
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(_) => ApiError::Conflict(EMAIL_TAKEN),
            e => ApiError::upstream("Failed to update user", e),
        })?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;

    info!("User updated: {}", user.id);

    Ok(Json(ApiResponse::ok(user)))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let id = parse_id(&id, INVALID_ID)?;

    state
        .store
        .delete_user(id)
        .await
        .map_err(|e| ApiError::upstream("Failed to delete user", e))?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;

    info!("User deleted: {}", id);

    Ok(Json(ApiResponse::message("User deleted successfully")))
}
