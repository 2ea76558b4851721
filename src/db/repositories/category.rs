//! Category repository
//!
//! Database operations for categories shared by blogs and projects.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, category: &Category) -> Result<Category>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;
    /// All categories by name
    async fn list(&self) -> Result<Vec<Category>>;
    async fn update(&self, category: &Category) -> Result<Category>;
    /// Delete; linked blogs and projects keep existing without a category
    async fn delete(&self, id: i64) -> Result<()>;
    /// Whether another category (not `exclude_id`) already uses `slug`
    async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), category).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), category).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_slug_sqlite(self.pool.as_sqlite().unwrap(), slug).await,
            DatabaseDriver::Mysql => get_by_slug_mysql(self.pool.as_mysql().unwrap(), slug).await,
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), category).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), category).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM categories WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to delete category")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM categories WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to delete category")?;
            }
        }
        Ok(())
    }

    async fn slug_taken(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM categories WHERE slug = ? AND id <> ?";
        let exclude = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await?
                .get("count"),
        };
        Ok(count > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    let result = sqlx::query("INSERT INTO categories (slug, name, description, created_at) VALUES (?, ?, ?, ?)")
        .bind(&category.slug)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.created_at)
        .execute(pool)
        .await
        .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_rowid(),
        ..category.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query("SELECT id, slug, name, description, created_at FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category")?;
    Ok(row.map(|r| row_to_category_sqlite(&r)))
}

async fn get_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Category>> {
    let row = sqlx::query("SELECT id, slug, name, description, created_at FROM categories WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by slug")?;
    Ok(row.map(|r| row_to_category_sqlite(&r)))
}

async fn list_sqlite(pool: &SqlitePool) -> Result<Vec<Category>> {
    let rows = sqlx::query("SELECT id, slug, name, description, created_at FROM categories ORDER BY name ASC, id ASC")
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;
    Ok(rows.iter().map(row_to_category_sqlite).collect())
}

async fn update_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    sqlx::query("UPDATE categories SET slug = ?, name = ?, description = ? WHERE id = ?")
        .bind(&category.slug)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.id)
        .execute(pool)
        .await
        .context("Failed to update category")?;
    get_by_id_sqlite(pool, category.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    let result = sqlx::query("INSERT INTO categories (slug, name, description, created_at) VALUES (?, ?, ?, ?)")
        .bind(&category.slug)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.created_at)
        .execute(pool)
        .await
        .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_id() as i64,
        ..category.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query("SELECT id, slug, name, description, created_at FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category")?;
    Ok(row.map(|r| row_to_category_mysql(&r)))
}

async fn get_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Category>> {
    let row = sqlx::query("SELECT id, slug, name, description, created_at FROM categories WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by slug")?;
    Ok(row.map(|r| row_to_category_mysql(&r)))
}

async fn list_mysql(pool: &MySqlPool) -> Result<Vec<Category>> {
    let rows = sqlx::query("SELECT id, slug, name, description, created_at FROM categories ORDER BY name ASC, id ASC")
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;
    Ok(rows.iter().map(row_to_category_mysql).collect())
}

async fn update_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    sqlx::query("UPDATE categories SET slug = ?, name = ?, description = ? WHERE id = ?")
        .bind(&category.slug)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.id)
        .execute(pool)
        .await
        .context("Failed to update category")?;
    get_by_id_mysql(pool, category.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Category {
    Category {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxCategoryRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxCategoryRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo
            .create(&Category::new("web".into(), "Web".into(), None))
            .await
            .expect("Failed to create category");
        assert!(created.id > 0);

        let mut found = repo.get_by_slug("web").await.unwrap().expect("by slug");
        found.name = "Web design".into();
        found.description = Some("Sites".into());
        let updated = repo.update(&found).await.unwrap();
        assert_eq!(updated.name, "Web design");
        assert_eq!(updated.description.as_deref(), Some("Sites"));
    }

    #[tokio::test]
    async fn test_slug_taken_excludes_self() {
        let (_pool, repo) = setup_test_repo().await;
        let cat = repo.create(&Category::new("seo".into(), "SEO".into(), None)).await.unwrap();

        assert!(repo.slug_taken("seo", None).await.unwrap());
        assert!(!repo.slug_taken("seo", Some(cat.id)).await.unwrap());
        assert!(!repo.slug_taken("other", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_detaches_blogs() {
        let (pool, repo) = setup_test_repo().await;
        let cat = repo.create(&Category::new("news".into(), "News".into(), None)).await.unwrap();
        sqlx::query("INSERT INTO blogs (slug, locale, title, content, content_html, category_id) VALUES ('a', 'fr', 'A', '', '', ?)")
            .bind(cat.id)
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();

        repo.delete(cat.id).await.unwrap();

        let category_id: Option<i64> = sqlx::query("SELECT category_id FROM blogs WHERE slug = 'a'")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
            .get("category_id");
        assert!(category_id.is_none());
        assert!(repo.list().await.unwrap().is_empty());
    }
}
