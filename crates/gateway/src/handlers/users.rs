//! User management handlers

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::handlers::schemas::{MessageResponse, UserCreate, UserListParams, UserResponse};
use crate::AppState;
use inkwell_common::{
    db::Repository,
    errors::{AppError, Result},
    metrics::{self, Resource},
};

/// Create a new user
///
/// Usernames and emails are unique; a taken one is a 400.
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let repo = Repository::new(state.db.clone());

    if repo.get_user_by_username(&input.username).await?.is_some() {
        return Err(AppError::UsernameTaken { username: input.username });
    }

    if repo.get_user_by_email(&input.email).await?.is_some() {
        return Err(AppError::EmailTaken { email: input.email });
    }

    let user = repo.create_user(input.username, input.email).await?;

    metrics::record_created(Resource::User);
    tracing::info!(user_id = user.id, username = %user.username, "User created");

    Ok((StatusCode::CREATED, Json(UserResponse::new(user, Vec::new()))))
}

/// List users with their blogs
pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<UserListParams>,
) -> Result<Json<Vec<UserResponse>>> {
    let repo = Repository::new(state.db.clone());

    let users = repo
        .list_users_with_blogs(params.skip(), params.limit())
        .await?
        .into_iter()
        .map(|(user, blogs)| UserResponse::new(user, blogs))
        .collect();

    Ok(Json(users))
}

/// Get a user by ID, blogs included
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
) -> Result<Json<UserResponse>> {
    let repo = Repository::new(state.db.clone());

    let (user, blogs) = repo
        .get_user_with_blogs(user_id)
        .await?
        .ok_or(AppError::UserNotFound { id: user_id })?;

    Ok(Json(UserResponse::new(user, blogs)))
}

/// Delete a user and all of its blogs
pub async fn delete_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
) -> Result<Json<MessageResponse>> {
    let repo = Repository::new(state.db.clone());

    if !repo.delete_user(user_id).await? {
        return Err(AppError::UserNotFound { id: user_id });
    }

    metrics::record_deleted(Resource::User);
    tracing::info!(user_id, "User deleted");

    Ok(Json(MessageResponse::new("User deleted successfully")))
}
