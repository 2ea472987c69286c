//! Table creation from entity definitions
//!
//! Builds `CREATE TABLE IF NOT EXISTS` statements for the backend in use,
//! parents before children so the foreign key target exists.

use crate::db::models::{BlogEntity, UserEntity};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Schema};
use tracing::info;

/// Create the `users` and `blogs` tables and their indexes if missing
pub async fn create_tables(conn: &DatabaseConnection) -> Result<()> {
    create_table(conn, UserEntity).await?;
    create_table(conn, BlogEntity).await?;

    info!("Database tables ready");
    Ok(())
}

async fn create_table<E>(conn: &DatabaseConnection, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let backend = conn.get_database_backend();
    let schema = Schema::new(backend);

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    conn.execute(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        conn.execute(backend.build(&index)).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::DbPool;

    #[tokio::test]
    async fn test_create_tables_is_idempotent() {
        let pool = DbPool::new(&DatabaseConfig::in_memory()).await.unwrap();

        create_tables(pool.connection()).await.unwrap();
        create_tables(pool.connection()).await.unwrap();

        let users = UserEntity::find().all(pool.connection()).await.unwrap();
        assert!(users.is_empty());
    }

    #[test]
    fn test_blogs_table_declares_cascading_foreign_key() {
        let backend = sea_orm::DbBackend::Sqlite;
        let table = Schema::new(backend).create_table_from_entity(BlogEntity);
        let sql = backend.build(&table).sql;

        assert!(sql.contains("REFERENCES \"users\""), "{sql}");
        assert!(sql.contains("ON DELETE CASCADE"), "{sql}");
    }
}
