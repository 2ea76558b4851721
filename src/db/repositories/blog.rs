//! Blog repository
//!
//! This module provides:
//! - `BlogRepository` trait defining the interface for blog data access
//! - `SqlxBlogRepository` implementing the trait for SQLite and MySQL
//!
//! Listing takes a prebuilt `SqlFilter` and a whitelisted `ORDER BY` body so
//! the admin grid and the public listing share one query path.

use crate::config::DatabaseDriver;
use crate::db::query::{bind_mysql, bind_sqlite, SqlFilter};
use crate::db::DynDatabasePool;
use crate::models::{Blog, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait BlogRepository: Send + Sync {
    async fn create(&self, blog: &Blog) -> Result<Blog>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>>;
    /// Lookup by (locale, slug), any status
    async fn get_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Blog>>;
    /// Filtered page plus the total count of matching rows
    async fn list(&self, filter: &SqlFilter, order_by: &str, params: &ListParams) -> Result<(Vec<Blog>, i64)>;
    /// Every matching row, unpaginated (sitemap)
    async fn list_all(&self, filter: &SqlFilter, order_by: &str) -> Result<Vec<Blog>>;
    async fn count(&self, filter: &SqlFilter) -> Result<i64>;
    async fn update(&self, blog: &Blog) -> Result<Blog>;
    async fn delete(&self, id: i64) -> Result<()>;
    /// Whether another blog (not `exclude_id`) uses `slug` in `locale`
    async fn slug_taken(&self, locale: &str, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxBlogRepository {
    pool: DynDatabasePool,
}

impl SqlxBlogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogRepository> {
        Arc::new(Self::new(pool))
    }
}

const BLOG_COLUMNS: &str = "id, slug, locale, title, excerpt, content, content_html, cover_image, \
     category_id, author_id, status, published_at, created_at, updated_at";

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn create(&self, blog: &Blog) -> Result<Blog> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), blog).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), blog).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>> {
        let mut filter = SqlFilter::new();
        filter.eq("id", id);
        Ok(self.list_all(&filter, "id ASC").await?.into_iter().next())
    }

    async fn get_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Blog>> {
        let mut filter = SqlFilter::new();
        filter.eq("locale", locale).eq("slug", slug);
        Ok(self.list_all(&filter, "id ASC").await?.into_iter().next())
    }

    async fn list(&self, filter: &SqlFilter, order_by: &str, params: &ListParams) -> Result<(Vec<Blog>, i64)> {
        let total = self.count(filter).await?;
        let items = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                select_sqlite(self.pool.as_sqlite().unwrap(), filter, order_by, Some(params)).await?
            }
            DatabaseDriver::Mysql => {
                select_mysql(self.pool.as_mysql().unwrap(), filter, order_by, Some(params)).await?
            }
        };
        Ok((items, total))
    }

    async fn list_all(&self, filter: &SqlFilter, order_by: &str) -> Result<Vec<Blog>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => select_sqlite(self.pool.as_sqlite().unwrap(), filter, order_by, None).await,
            DatabaseDriver::Mysql => select_mysql(self.pool.as_mysql().unwrap(), filter, order_by, None).await,
        }
    }

    async fn count(&self, filter: &SqlFilter) -> Result<i64> {
        let driver = self.pool.driver();
        let sql = format!("SELECT COUNT(*) as count FROM blogs{}", filter.where_sql(driver));
        let binds = filter.binds(driver);
        let count = match driver {
            DatabaseDriver::Sqlite => bind_sqlite(sqlx::query(&sql), &binds)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count blogs")?
                .get::<i64, _>("count"),
            DatabaseDriver::Mysql => bind_mysql(sqlx::query(&sql), &binds)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count blogs")?
                .get::<i64, _>("count"),
        };
        Ok(count)
    }

    async fn update(&self, blog: &Blog) -> Result<Blog> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), blog).await?,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), blog).await?,
        }
        self.get_by_id(blog.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Blog not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM blogs WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to delete blog")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM blogs WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to delete blog")?;
            }
        }
        Ok(())
    }

    async fn slug_taken(&self, locale: &str, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let mut filter = SqlFilter::new();
        filter
            .eq("locale", locale)
            .eq("slug", slug)
            .push("id <> ?", [exclude_id.unwrap_or(0).into()]);
        Ok(self.count(&filter).await? > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, blog: &Blog) -> Result<Blog> {
    let result = sqlx::query(
        r#"
        INSERT INTO blogs (slug, locale, title, excerpt, content, content_html, cover_image,
                           category_id, author_id, status, published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&blog.slug)
    .bind(&blog.locale)
    .bind(&blog.title)
    .bind(&blog.excerpt)
    .bind(&blog.content)
    .bind(&blog.content_html)
    .bind(&blog.cover_image)
    .bind(blog.category_id)
    .bind(blog.author_id)
    .bind(blog.status.as_str())
    .bind(blog.published_at)
    .bind(blog.created_at)
    .bind(blog.updated_at)
    .execute(pool)
    .await
    .context("Failed to create blog")?;

    Ok(Blog {
        id: result.last_insert_rowid(),
        ..blog.clone()
    })
}

async fn select_sqlite(
    pool: &SqlitePool,
    filter: &SqlFilter,
    order_by: &str,
    params: Option<&ListParams>,
) -> Result<Vec<Blog>> {
    let mut sql = format!("SELECT {} FROM blogs{} ORDER BY {}", BLOG_COLUMNS, filter.where_sql(DatabaseDriver::Sqlite), order_by);
    if params.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
    }
    let mut query = bind_sqlite(sqlx::query(&sql), &filter.binds(DatabaseDriver::Sqlite));
    if let Some(params) = params {
        query = query.bind(params.limit()).bind(params.offset());
    }
    let rows = query.fetch_all(pool).await.context("Failed to list blogs")?;
    rows.iter().map(row_to_blog_sqlite).collect()
}

async fn update_sqlite(pool: &SqlitePool, blog: &Blog) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE blogs
        SET slug = ?, locale = ?, title = ?, excerpt = ?, content = ?, content_html = ?, cover_image = ?,
            category_id = ?, status = ?, published_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&blog.slug)
    .bind(&blog.locale)
    .bind(&blog.title)
    .bind(&blog.excerpt)
    .bind(&blog.content)
    .bind(&blog.content_html)
    .bind(&blog.cover_image)
    .bind(blog.category_id)
    .bind(blog.status.as_str())
    .bind(blog.published_at)
    .bind(blog.updated_at)
    .bind(blog.id)
    .execute(pool)
    .await
    .context("Failed to update blog")?;
    Ok(())
}

fn row_to_blog_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Blog> {
    let status: String = row.get("status");
    Ok(Blog {
        id: row.get("id"),
        slug: row.get("slug"),
        locale: row.get("locale"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        cover_image: row.get("cover_image"),
        category_id: row.get("category_id"),
        author_id: row.get("author_id"),
        status: FromStr::from_str(&status)?,
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, blog: &Blog) -> Result<Blog> {
    let result = sqlx::query(
        r#"
        INSERT INTO blogs (slug, locale, title, excerpt, content, content_html, cover_image,
                           category_id, author_id, status, published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&blog.slug)
    .bind(&blog.locale)
    .bind(&blog.title)
    .bind(&blog.excerpt)
    .bind(&blog.content)
    .bind(&blog.content_html)
    .bind(&blog.cover_image)
    .bind(blog.category_id)
    .bind(blog.author_id)
    .bind(blog.status.as_str())
    .bind(blog.published_at)
    .bind(blog.created_at)
    .bind(blog.updated_at)
    .execute(pool)
    .await
    .context("Failed to create blog")?;

    Ok(Blog {
        id: result.last_insert_id() as i64,
        ..blog.clone()
    })
}

async fn select_mysql(
    pool: &MySqlPool,
    filter: &SqlFilter,
    order_by: &str,
    params: Option<&ListParams>,
) -> Result<Vec<Blog>> {
    let mut sql = format!("SELECT {} FROM blogs{} ORDER BY {}", BLOG_COLUMNS, filter.where_sql(DatabaseDriver::Mysql), order_by);
    if params.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
    }
    let mut query = bind_mysql(sqlx::query(&sql), &filter.binds(DatabaseDriver::Mysql));
    if let Some(params) = params {
        query = query.bind(params.limit()).bind(params.offset());
    }
    let rows = query.fetch_all(pool).await.context("Failed to list blogs")?;
    rows.iter().map(row_to_blog_mysql).collect()
}

async fn update_mysql(pool: &MySqlPool, blog: &Blog) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE blogs
        SET slug = ?, locale = ?, title = ?, excerpt = ?, content = ?, content_html = ?, cover_image = ?,
            category_id = ?, status = ?, published_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&blog.slug)
    .bind(&blog.locale)
    .bind(&blog.title)
    .bind(&blog.excerpt)
    .bind(&blog.content)
    .bind(&blog.content_html)
    .bind(&blog.cover_image)
    .bind(blog.category_id)
    .bind(blog.status.as_str())
    .bind(blog.published_at)
    .bind(blog.updated_at)
    .bind(blog.id)
    .execute(pool)
    .await
    .context("Failed to update blog")?;
    Ok(())
}

fn row_to_blog_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Blog> {
    let status: String = row.get("status");
    Ok(Blog {
        id: row.get("id"),
        slug: row.get("slug"),
        locale: row.get("locale"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        cover_image: row.get("cover_image"),
        category_id: row.get("category_id"),
        author_id: row.get("author_id"),
        status: FromStr::from_str(&status)?,
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::PublishStatus;
    use chrono::Utc;

    async fn setup_test_repo() -> SqlxBlogRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxBlogRepository::new(pool)
    }

    fn blog(slug: &str, locale: &str, status: PublishStatus) -> Blog {
        let now = Utc::now();
        Blog {
            id: 0,
            slug: slug.to_string(),
            locale: locale.to_string(),
            title: format!("Title {}", slug),
            excerpt: None,
            content: "Body".to_string(),
            content_html: "<p>Body</p>\n".to_string(),
            cover_image: None,
            category_id: None,
            author_id: None,
            status,
            published_at: (status == PublishStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_by_slug() {
        let repo = setup_test_repo().await;
        let created = repo.create(&blog("hello", "fr", PublishStatus::Draft)).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_by_slug("fr", "hello").await.unwrap().expect("found");
        assert_eq!(found.id, created.id);
        assert_eq!(found.status, PublishStatus::Draft);
        assert!(repo.get_by_slug("en", "hello").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_slug_taken_per_locale() {
        let repo = setup_test_repo().await;
        let fr = repo.create(&blog("hello", "fr", PublishStatus::Draft)).await.unwrap();

        assert!(repo.slug_taken("fr", "hello", None).await.unwrap());
        assert!(!repo.slug_taken("fr", "hello", Some(fr.id)).await.unwrap());
        assert!(!repo.slug_taken("en", "hello", None).await.unwrap());

        repo.create(&blog("hello", "en", PublishStatus::Draft)).await.unwrap();
        assert!(repo.create(&blog("hello", "fr", PublishStatus::Draft)).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_and_counts() {
        let repo = setup_test_repo().await;
        for i in 0..4 {
            repo.create(&blog(&format!("pub-{}", i), "fr", PublishStatus::Published)).await.unwrap();
        }
        repo.create(&blog("draft", "fr", PublishStatus::Draft)).await.unwrap();

        let mut filter = SqlFilter::new();
        filter.eq("status", "published");
        let (items, total) = repo.list(&filter, "id DESC", &ListParams::new(1, 3)).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].slug, "pub-3");

        assert_eq!(repo.count(&SqlFilter::new()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&blog("a", "fr", PublishStatus::Draft)).await.unwrap();
        created.title = "Renamed".into();
        created.status = PublishStatus::Published;
        let updated = repo.update(&created).await.unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.status, PublishStatus::Published);

        repo.delete(created.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }
}
