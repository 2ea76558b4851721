//! Project repository

use crate::config::DatabaseDriver;
use crate::db::query::{bind_mysql, bind_sqlite, SqlFilter};
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Project};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: &Project) -> Result<Project>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Project>>;
    async fn get_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Project>>;
    async fn list(&self, filter: &SqlFilter, order_by: &str, params: &ListParams) -> Result<(Vec<Project>, i64)>;
    async fn list_all(&self, filter: &SqlFilter, order_by: &str) -> Result<Vec<Project>>;
    async fn count(&self, filter: &SqlFilter) -> Result<i64>;
    async fn update(&self, project: &Project) -> Result<Project>;
    /// Delete; the project's reviews go with it
    async fn delete(&self, id: i64) -> Result<()>;
    async fn slug_taken(&self, locale: &str, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

pub struct SqlxProjectRepository {
    pool: DynDatabasePool,
}

impl SqlxProjectRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProjectRepository> {
        Arc::new(Self::new(pool))
    }
}

const PROJECT_COLUMNS: &str = "id, slug, locale, title, summary, content, content_html, cover_image, url, \
     client_id, category_id, status, featured, sort_order, created_at, updated_at";

#[async_trait]
impl ProjectRepository for SqlxProjectRepository {
    async fn create(&self, project: &Project) -> Result<Project> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), project).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), project).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Project>> {
        let mut filter = SqlFilter::new();
        filter.eq("id", id);
        Ok(self.list_all(&filter, "id ASC").await?.into_iter().next())
    }

    async fn get_by_slug(&self, locale: &str, slug: &str) -> Result<Option<Project>> {
        let mut filter = SqlFilter::new();
        filter.eq("locale", locale).eq("slug", slug);
        Ok(self.list_all(&filter, "id ASC").await?.into_iter().next())
    }

    async fn list(&self, filter: &SqlFilter, order_by: &str, params: &ListParams) -> Result<(Vec<Project>, i64)> {
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

    async fn list_all(&self, filter: &SqlFilter, order_by: &str) -> Result<Vec<Project>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => select_sqlite(self.pool.as_sqlite().unwrap(), filter, order_by, None).await,
            DatabaseDriver::Mysql => select_mysql(self.pool.as_mysql().unwrap(), filter, order_by, None).await,
        }
    }

    async fn count(&self, filter: &SqlFilter) -> Result<i64> {
        let driver = self.pool.driver();
        let sql = format!("SELECT COUNT(*) as count FROM projects{}", filter.where_sql(driver));
        let binds = filter.binds(driver);
        let count = match driver {
            DatabaseDriver::Sqlite => bind_sqlite(sqlx::query(&sql), &binds)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count projects")?
                .get::<i64, _>("count"),
            DatabaseDriver::Mysql => bind_mysql(sqlx::query(&sql), &binds)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count projects")?
                .get::<i64, _>("count"),
        };
        Ok(count)
    }

    async fn update(&self, project: &Project) -> Result<Project> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), project).await?,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), project).await?,
        }
        self.get_by_id(project.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Project not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM projects WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to delete project")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM projects WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to delete project")?;
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

async fn create_sqlite(pool: &SqlitePool, project: &Project) -> Result<Project> {
    let result = sqlx::query(
        r#"
        INSERT INTO projects (slug, locale, title, summary, content, content_html, cover_image, url,
                              client_id, category_id, status, featured, sort_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&project.slug)
    .bind(&project.locale)
    .bind(&project.title)
    .bind(&project.summary)
    .bind(&project.content)
    .bind(&project.content_html)
    .bind(&project.cover_image)
    .bind(&project.url)
    .bind(project.client_id)
    .bind(project.category_id)
    .bind(project.status.as_str())
    .bind(project.featured)
    .bind(project.sort_order)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(pool)
    .await
    .context("Failed to create project")?;

    Ok(Project {
        id: result.last_insert_rowid(),
        ..project.clone()
    })
}

async fn select_sqlite(
    pool: &SqlitePool,
    filter: &SqlFilter,
    order_by: &str,
    params: Option<&ListParams>,
) -> Result<Vec<Project>> {
    let mut sql = format!("SELECT {} FROM projects{} ORDER BY {}", PROJECT_COLUMNS, filter.where_sql(DatabaseDriver::Sqlite), order_by);
    if params.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
    }
    let mut query = bind_sqlite(sqlx::query(&sql), &filter.binds(DatabaseDriver::Sqlite));
    if let Some(params) = params {
        query = query.bind(params.limit()).bind(params.offset());
    }
    let rows = query.fetch_all(pool).await.context("Failed to list projects")?;
    rows.iter().map(row_to_project_sqlite).collect()
}

async fn update_sqlite(pool: &SqlitePool, project: &Project) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE projects
        SET slug = ?, locale = ?, title = ?, summary = ?, content = ?, content_html = ?, cover_image = ?, url = ?,
            client_id = ?, category_id = ?, status = ?, featured = ?, sort_order = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&project.slug)
    .bind(&project.locale)
    .bind(&project.title)
    .bind(&project.summary)
    .bind(&project.content)
    .bind(&project.content_html)
    .bind(&project.cover_image)
    .bind(&project.url)
    .bind(project.client_id)
    .bind(project.category_id)
    .bind(project.status.as_str())
    .bind(project.featured)
    .bind(project.sort_order)
    .bind(project.updated_at)
    .bind(project.id)
    .execute(pool)
    .await
    .context("Failed to update project")?;
    Ok(())
}

fn row_to_project_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Project> {
    let status: String = row.get("status");
    Ok(Project {
        id: row.get("id"),
        slug: row.get("slug"),
        locale: row.get("locale"),
        title: row.get("title"),
        summary: row.get("summary"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        cover_image: row.get("cover_image"),
        url: row.get("url"),
        client_id: row.get("client_id"),
        category_id: row.get("category_id"),
        status: status.parse()?,
        featured: row.get("featured"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, project: &Project) -> Result<Project> {
    let result = sqlx::query(
        r#"
        INSERT INTO projects (slug, locale, title, summary, content, content_html, cover_image, url,
                              client_id, category_id, status, featured, sort_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&project.slug)
    .bind(&project.locale)
    .bind(&project.title)
    .bind(&project.summary)
    .bind(&project.content)
    .bind(&project.content_html)
    .bind(&project.cover_image)
    .bind(&project.url)
    .bind(project.client_id)
    .bind(project.category_id)
    .bind(project.status.as_str())
    .bind(project.featured)
    .bind(project.sort_order)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(pool)
    .await
    .context("Failed to create project")?;

    Ok(Project {
        id: result.last_insert_id() as i64,
        ..project.clone()
    })
}

async fn select_mysql(
    pool: &MySqlPool,
    filter: &SqlFilter,
    order_by: &str,
    params: Option<&ListParams>,
) -> Result<Vec<Project>> {
    let mut sql = format!("SELECT {} FROM projects{} ORDER BY {}", PROJECT_COLUMNS, filter.where_sql(DatabaseDriver::Mysql), order_by);
    if params.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
    }
    let mut query = bind_mysql(sqlx::query(&sql), &filter.binds(DatabaseDriver::Mysql));
    if let Some(params) = params {
        query = query.bind(params.limit()).bind(params.offset());
    }
    let rows = query.fetch_all(pool).await.context("Failed to list projects")?;
    rows.iter().map(row_to_project_mysql).collect()
}

async fn update_mysql(pool: &MySqlPool, project: &Project) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE projects
        SET slug = ?, locale = ?, title = ?, summary = ?, content = ?, content_html = ?, cover_image = ?, url = ?,
            client_id = ?, category_id = ?, status = ?, featured = ?, sort_order = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&project.slug)
    .bind(&project.locale)
    .bind(&project.title)
    .bind(&project.summary)
    .bind(&project.content)
    .bind(&project.content_html)
    .bind(&project.cover_image)
    .bind(&project.url)
    .bind(project.client_id)
    .bind(project.category_id)
    .bind(project.status.as_str())
    .bind(project.featured)
    .bind(project.sort_order)
    .bind(project.updated_at)
    .bind(project.id)
    .execute(pool)
    .await
    .context("Failed to update project")?;
    Ok(())
}

fn row_to_project_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Project> {
    let status: String = row.get("status");
    Ok(Project {
        id: row.get("id"),
        slug: row.get("slug"),
        locale: row.get("locale"),
        title: row.get("title"),
        summary: row.get("summary"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        cover_image: row.get("cover_image"),
        url: row.get("url"),
        client_id: row.get("client_id"),
        category_id: row.get("category_id"),
        status: status.parse()?,
        featured: row.get("featured"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
