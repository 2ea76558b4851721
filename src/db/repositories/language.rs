//! Language repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Language;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait LanguageRepository: Send + Sync {
    async fn create(&self, code: &str, name: &str) -> Result<Language>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Language>>;
    async fn get_by_code(&self, code: &str) -> Result<Option<Language>>;
    /// Default language first, then by code
    async fn list(&self) -> Result<Vec<Language>>;
    async fn get_default(&self) -> Result<Option<Language>>;
    async fn update_name(&self, id: i64, name: &str) -> Result<()>;
    /// Make `id` the only default language
    async fn set_default(&self, id: i64) -> Result<()>;
    async fn delete(&self, id: i64) -> Result<()>;
    /// Number of blogs and projects written in `code`
    async fn usage_count(&self, code: &str) -> Result<i64>;
}

pub struct SqlxLanguageRepository {
    pool: DynDatabasePool,
}

impl SqlxLanguageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LanguageRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_LANGUAGE: &str = "SELECT id, code, name, is_default, created_at FROM languages";

#[async_trait]
impl LanguageRepository for SqlxLanguageRepository {
    async fn create(&self, code: &str, name: &str) -> Result<Language> {
        let now = Utc::now();
        let sql = "INSERT INTO languages (code, name, is_default, created_at) VALUES (?, ?, ?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(code)
                .bind(name)
                .bind(false)
                .bind(now)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to create language")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(code)
                .bind(name)
                .bind(false)
                .bind(now)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to create language")?
                .last_insert_id() as i64,
        };

        Ok(Language {
            id,
            code: code.to_string(),
            name: name.to_string(),
            is_default: false,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Language>> {
        let sql = format!("{} WHERE id = ?", SELECT_LANGUAGE);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get language")?;
                Ok(row.map(|r| row_to_language_sqlite(&r)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get language")?;
                Ok(row.map(|r| row_to_language_mysql(&r)))
            }
        }
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Language>> {
        let sql = format!("{} WHERE code = ?", SELECT_LANGUAGE);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(code)
                    .fetch_optional(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to get language by code")?;
                Ok(row.map(|r| row_to_language_sqlite(&r)))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(code)
                    .fetch_optional(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to get language by code")?;
                Ok(row.map(|r| row_to_language_mysql(&r)))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Language>> {
        list_where(&self.pool, "").await
    }

    async fn get_default(&self) -> Result<Option<Language>> {
        Ok(list_where(&self.pool, " WHERE is_default = 1").await?.into_iter().next())
    }

    async fn update_name(&self, id: i64, name: &str) -> Result<()> {
        let sql = "UPDATE languages SET name = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(name)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to update language")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(name)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to update language")?;
            }
        }
        Ok(())
    }

    async fn set_default(&self, id: i64) -> Result<()> {
        // Single statement so there is never zero or two defaults
        let sql = "UPDATE languages SET is_default = CASE WHEN id = ? THEN 1 ELSE 0 END";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to set default language")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to set default language")?;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM languages WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to delete language")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to delete language")?;
            }
        }
        Ok(())
    }

    async fn usage_count(&self, code: &str) -> Result<i64> {
        let sql = "SELECT (SELECT COUNT(*) FROM blogs WHERE locale = ?) + (SELECT COUNT(*) FROM projects WHERE locale = ?) AS count";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(code)
                .bind(code)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count language usage")?
                .get::<i64, _>("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(code)
                .bind(code)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count language usage")?
                .get::<i64, _>("count"),
        };
        Ok(count)
    }
}

async fn list_where(pool: &DynDatabasePool, predicate: &str) -> Result<Vec<Language>> {
    let sql = format!("{}{} ORDER BY is_default DESC, code ASC", SELECT_LANGUAGE, predicate);
    match pool.driver() {
        DatabaseDriver::Sqlite => list_sqlite(pool.as_sqlite().unwrap(), &sql).await,
        DatabaseDriver::Mysql => list_mysql(pool.as_mysql().unwrap(), &sql).await,
    }
}

async fn list_sqlite(pool: &SqlitePool, sql: &str) -> Result<Vec<Language>> {
    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .context("Failed to list languages")?;
    Ok(rows.iter().map(row_to_language_sqlite).collect())
}

async fn list_mysql(pool: &MySqlPool, sql: &str) -> Result<Vec<Language>> {
    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .context("Failed to list languages")?;
    Ok(rows.iter().map(row_to_language_mysql).collect())
}

fn row_to_language_sqlite(row: &sqlx::sqlite::SqliteRow) -> Language {
    Language {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        is_default: row.get("is_default"),
        created_at: row.get("created_at"),
    }
}

fn row_to_language_mysql(row: &sqlx::mysql::MySqlRow) -> Language {
    Language {
        id: row.get("id"),
        code: row.get("code"),
        name: row.get("name"),
        is_default: row.get("is_default"),
        created_at: row.get("created_at"),
    }
}
