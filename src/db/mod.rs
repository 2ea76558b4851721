//! Database layer
//!
//! Vitrine runs on either backend:
//! - SQLite (default, single-binary deployment)
//! - MySQL (shared hosting)
//!
//! The driver is selected by configuration. Repositories dispatch on
//! `DatabasePool::driver()` and keep one SQL function per dialect.
//!
//! # Usage
//!
//! ```ignore
//! use vitrine::config::DatabaseConfig;
//! use vitrine::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod query;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Whether `err` was caused by a UNIQUE constraint violation on either backend.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{CategoryRepository, SqlxCategoryRepository};
    use crate::models::Category;

    #[tokio::test]
    async fn test_is_unique_violation() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        let repo = SqlxCategoryRepository::new(pool.clone());

        let category = Category::new("design".to_string(), "Design".to_string(), None);
        repo.create(&category).await.unwrap();
        let err = repo.create(&category).await.unwrap_err();
        assert!(is_unique_violation(&err));

        let err = sqlx::query("SELECT * FROM missing_table")
            .execute(pool.as_sqlite().unwrap())
            .await
            .map_err(anyhow::Error::from)
            .unwrap_err();
        assert!(!is_unique_violation(&err));
    }
}
