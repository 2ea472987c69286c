//! Database layer for Inkwell
//!
//! Provides:
//! - SeaORM entity models
//! - Repository pattern for data access
//! - Connection pool management
//! - Table creation from the entity definitions

pub mod models;
mod repository;
pub mod schema;

pub use repository::{BlogFilter, Repository};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
///
/// Cloning is cheap; every clone shares the same underlying pool. Each query
/// borrows a connection and hands it back when the future completes.
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!(backend = backend_name(&config.url), "Connecting to database...");

        let mut opts = ConnectOptions::new(config.url.clone());
        opts.connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .sqlx_logging(config.log_statements);

        if config.is_in_memory() {
            // Every pooled connection would otherwise get its own empty database
            opts.max_connections(1).min_connections(1);
        } else {
            opts.max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(Duration::from_secs(config.idle_timeout_secs));
        }

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e)
            })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    /// Connection handle for a unit of work
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }
}

/// Scheme of a connection URL, safe to log (no credentials)
fn backend_name(url: &str) -> &str {
    url.split(':').next().unwrap_or("unknown")
}
