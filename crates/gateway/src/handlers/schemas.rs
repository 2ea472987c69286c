//! Request and response schemas
//!
//! Inputs derive `Validate`; outputs are built from the stored entities.

use chrono::{DateTime, Utc};
use inkwell_common::db::models::{Blog, User};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Largest page any listing returns
pub const MAX_PAGE_SIZE: u64 = 100;

// ============================================================================
// Users
// ============================================================================

/// Request to create a new user
#[derive(Debug, Deserialize, Validate)]
pub struct UserCreate {
    #[validate(length(min = 1, max = 50))]
    pub username: String,

    #[validate(email)]
    pub email: String,
}

/// A user with its blogs nested
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub blogs: Vec<BlogResponse>,
}

impl UserResponse {
    pub fn new(user: User, blogs: Vec<Blog>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            blogs: blogs.into_iter().map(BlogResponse::from).collect(),
        }
    }
}

/// Query parameters for listing users
#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl UserListParams {
    pub fn skip(&self) -> u64 {
        self.skip.unwrap_or(0)
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }
}

// ============================================================================
// Blogs
// ============================================================================

/// Request to create a blog
#[derive(Debug, Deserialize, Validate)]
pub struct BlogCreate {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    pub content: String,

    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

/// A stored blog
#[derive(Debug, Serialize, Deserialize)]
pub struct BlogResponse {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub owner_id: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Blog> for BlogResponse {
    fn from(blog: Blog) -> Self {
        Self {
            id: blog.id,
            title: blog.title,
            content: blog.content,
            published: blog.published,
            owner_id: blog.owner_id,
            created_at: blog.created_at,
        }
    }
}

/// Owner of a blog being created, taken from the query string
#[derive(Debug, Deserialize)]
pub struct BlogOwnerParams {
    pub user_id: i32,
}

/// Query parameters for listing blogs
#[derive(Debug, Default, Deserialize)]
pub struct BlogListParams {
    /// 1-based index of the first blog
    pub start: Option<u64>,
    pub limit: Option<u64>,
    pub published: Option<bool>,
}

// ============================================================================
// Shared
// ============================================================================

/// Confirmation body for deletes
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
