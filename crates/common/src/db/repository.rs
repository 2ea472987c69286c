//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, LoaderTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};

/// Largest offset/limit the SQL drivers bind; they carry them as signed 64-bit
const MAX_ROWS: u64 = i64::MAX as u64;

/// Pagination and filtering for blog listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlogFilter {
    /// 1-based position of the first blog to return
    pub start: u64,
    pub limit: u64,
    /// Only blogs with this published flag; all blogs when unset
    pub published: Option<bool>,
}

impl Default for BlogFilter {
    fn default() -> Self {
        Self {
            start: 1,
            limit: 10,
            published: None,
        }
    }
}

impl BlogFilter {
    fn offset(&self) -> u64 {
        self.start.saturating_sub(1).min(MAX_ROWS)
    }
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.connection()
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Find user by ID
    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by exact username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Username.eq(username))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by exact email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by ID together with all of its blogs, in one joined query
    pub async fn get_user_with_blogs(&self, id: i32) -> Result<Option<(User, Vec<Blog>)>> {
        let mut rows = UserEntity::find_by_id(id)
            .find_with_related(BlogEntity)
            .order_by_asc(BlogColumn::Id)
            .all(self.conn())
            .await?;

        Ok(rows.pop())
    }

    /// List users ordered by ID, each with its blogs
    pub async fn list_users_with_blogs(
        &self,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<(User, Vec<Blog>)>> {
        let users = UserEntity::find()
            .order_by_asc(UserColumn::Id)
            .offset(skip.min(MAX_ROWS))
            .limit(limit.min(MAX_ROWS))
            .all(self.conn())
            .await?;

        let blogs = users.load_many(BlogEntity, self.conn()).await?;

        Ok(users.into_iter().zip(blogs).collect())
    }

    /// Create a new user and return the stored row
    pub async fn create_user(&self, username: String, email: String) -> Result<User> {
        let user = UserActiveModel {
            username: Set(username.clone()),
            email: Set(email.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        user.insert(self.conn())
            .await
            .map_err(|e| user_insert_error(e, username, email))
    }

    /// Delete a user and every blog it owns
    ///
    /// Runs in a single transaction so a partial delete never becomes
    /// visible. Returns `false` when no such user exists.
    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        let txn = self.conn().begin().await?;

        let blogs = BlogEntity::delete_many()
            .filter(BlogColumn::OwnerId.eq(id))
            .exec(&txn)
            .await?;

        let user = UserEntity::delete_by_id(id).exec(&txn).await?;

        if user.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        txn.commit().await?;

        tracing::debug!(
            user_id = id,
            blogs_deleted = blogs.rows_affected,
            "User deleted with blogs"
        );

        Ok(true)
    }

    // ========================================================================
    // Blog Operations
    // ========================================================================

    /// Create a blog owned by `owner_id` and return the stored row
    pub async fn create_user_blog(
        &self,
        owner_id: i32,
        title: String,
        content: String,
        published: bool,
    ) -> Result<Blog> {
        let blog = BlogActiveModel {
            title: Set(title),
            content: Set(content),
            published: Set(published),
            created_at: Set(Utc::now()),
            owner_id: Set(owner_id),
            ..Default::default()
        };

        blog.insert(self.conn()).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                AppError::UserNotFound { id: owner_id }
            }
            _ => e.into(),
        })
    }

    /// Find blog by ID
    pub async fn get_blog(&self, id: i32) -> Result<Option<Blog>> {
        BlogEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// List blogs ordered by ID
    pub async fn list_blogs(&self, filter: &BlogFilter) -> Result<Vec<Blog>> {
        let mut query = BlogEntity::find();

        if let Some(published) = filter.published {
            query = query.filter(BlogColumn::Published.eq(published));
        }

        query
            .order_by_asc(BlogColumn::Id)
            .offset(filter.offset())
            .limit(filter.limit.min(MAX_ROWS))
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Delete blog by ID
    pub async fn delete_blog(&self, id: i32) -> Result<bool> {
        let result = BlogEntity::delete_by_id(id)
            .exec(self.conn())
            .await?;

        Ok(result.rows_affected > 0)
    }
}

/// Map a unique violation on insert to the field that collided
fn user_insert_error(err: DbErr, username: String, email: String) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("email") => {
            AppError::EmailTaken { email }
        }
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::UsernameTaken { username },
        _ => err.into(),
    }
}
