//! Blog handlers

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::extract::{ApiPath, ApiQuery, ValidatedJson};
use crate::handlers::schemas::{
    BlogCreate, BlogListParams, BlogOwnerParams, BlogResponse, MessageResponse, MAX_PAGE_SIZE,
};
use crate::AppState;
use inkwell_common::{
    db::{BlogFilter, Repository},
    errors::{AppError, Result},
    metrics::{self, Resource},
};

/// Create a blog for an existing user (`?user_id=`)
pub async fn create_blog(
    State(state): State<AppState>,
    ApiQuery(owner): ApiQuery<BlogOwnerParams>,
    ValidatedJson(input): ValidatedJson<BlogCreate>,
) -> Result<(StatusCode, Json<BlogResponse>)> {
    let repo = Repository::new(state.db.clone());

    if repo.get_user(owner.user_id).await?.is_none() {
        return Err(AppError::UserNotFound { id: owner.user_id });
    }

    let blog = repo
        .create_user_blog(owner.user_id, input.title, input.content, input.published)
        .await?;

    metrics::record_created(Resource::Blog);
    tracing::info!(blog_id = blog.id, owner_id = blog.owner_id, "Blog created");

    Ok((StatusCode::CREATED, Json(blog.into())))
}

/// List blogs, paginated from a 1-based `start`
pub async fn list_blogs(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<BlogListParams>,
) -> Result<Json<Vec<BlogResponse>>> {
    let repo = Repository::new(state.db.clone());

    let defaults = BlogFilter::default();
    let filter = BlogFilter {
        start: params.start.unwrap_or(defaults.start).max(1),
        limit: params.limit.unwrap_or(defaults.limit).min(MAX_PAGE_SIZE),
        published: params.published,
    };

    let blogs = repo
        .list_blogs(&filter)
        .await?
        .into_iter()
        .map(BlogResponse::from)
        .collect();

    Ok(Json(blogs))
}

/// Get a blog by ID
pub async fn get_blog(
    State(state): State<AppState>,
    ApiPath(blog_id): ApiPath<i32>,
) -> Result<Json<BlogResponse>> {
    let repo = Repository::new(state.db.clone());

    let blog = repo
        .get_blog(blog_id)
        .await?
        .ok_or(AppError::BlogNotFound { id: blog_id })?;

    Ok(Json(blog.into()))
}

/// Delete a blog
pub async fn delete_blog(
    State(state): State<AppState>,
    ApiPath(blog_id): ApiPath<i32>,
) -> Result<Json<MessageResponse>> {
    let repo = Repository::new(state.db.clone());

    if !repo.delete_blog(blog_id).await? {
        return Err(AppError::BlogNotFound { id: blog_id });
    }

    metrics::record_deleted(Resource::Blog);
    tracing::info!(blog_id, "Blog deleted");

    Ok(Json(MessageResponse::new("Blog deleted successfully")))
}
