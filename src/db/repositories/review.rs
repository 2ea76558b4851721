//! Project review repository
//!
//! Reviews are always read joined with their project title and client name.
//! Filters passed to `list`/`count` must therefore use the `r.`, `p.` and
//! `c.` table aliases.
//!
//! Submission and regeneration are conditional updates: the `WHERE` clause
//! re-checks the state, so two concurrent submits of the same token cannot
//! both succeed.

use crate::config::DatabaseDriver;
use crate::db::query::{bind_mysql, bind_sqlite, SqlFilter};
use crate::db::DynDatabasePool;
use crate::models::{ListParams, ProjectReview, ReviewSubmission, Testimonial};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Insert a pending review link
    async fn create(&self, project_id: i64, client_id: i64, token: &str, expires_at: DateTime<Utc>) -> Result<ProjectReview>;
    async fn get_by_id(&self, id: i64) -> Result<Option<ProjectReview>>;
    async fn get_by_token(&self, token: &str) -> Result<Option<ProjectReview>>;
    async fn list(&self, filter: &SqlFilter, order_by: &str, params: &ListParams) -> Result<(Vec<ProjectReview>, i64)>;
    async fn count(&self, filter: &SqlFilter) -> Result<i64>;
    /// Admin edit of content fields and publication flag
    async fn update(&self, review: &ProjectReview) -> Result<ProjectReview>;
    /// Record a submission if the token is still open at `now`.
    /// Returns false when it was already used or has expired.
    async fn submit(&self, token: &str, submission: &ReviewSubmission, now: DateTime<Utc>) -> Result<bool>;
    /// Replace token and expiry of a review not yet submitted.
    /// Returns false when the review has been submitted meanwhile.
    async fn regenerate(&self, id: i64, token: &str, expires_at: DateTime<Utc>) -> Result<bool>;
    async fn delete(&self, id: i64) -> Result<()>;
    /// Submitted and published reviews, newest first
    async fn list_testimonials(&self, project_id: Option<i64>, limit: i64) -> Result<Vec<Testimonial>>;
}

pub struct SqlxReviewRepository {
    pool: DynDatabasePool,
}

impl SqlxReviewRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReviewRepository> {
        Arc::new(Self::new(pool))
    }
}

const REVIEW_SELECT: &str = r#"
    SELECT r.id, r.project_id, r.client_id, r.token, r.expires_at, r.submitted_at, r.rating, r.content,
           r.author_name, r.author_role, r.published, r.created_at, r.updated_at,
           p.title AS project_title, c.name AS client_name
    FROM project_reviews r
    JOIN projects p ON p.id = r.project_id
    JOIN clients c ON c.id = r.client_id"#;

const REVIEW_FROM: &str = r#"
    FROM project_reviews r
    JOIN projects p ON p.id = r.project_id
    JOIN clients c ON c.id = r.client_id"#;

const SUBMIT_SQL: &str = r#"
    UPDATE project_reviews
    SET rating = ?, content = ?, author_name = ?, author_role = ?, submitted_at = ?, updated_at = ?
    WHERE token = ? AND submitted_at IS NULL AND expires_at >= ?"#;

const REGENERATE_SQL: &str = r#"
    UPDATE project_reviews
    SET token = ?, expires_at = ?, updated_at = ?
    WHERE id = ? AND submitted_at IS NULL"#;

const UPDATE_SQL: &str = r#"
    UPDATE project_reviews
    SET rating = ?, content = ?, author_name = ?, author_role = ?, published = ?, updated_at = ?
    WHERE id = ?"#;

const TESTIMONIAL_SELECT: &str = r#"
    SELECT r.id, r.project_id, p.title AS project_title, r.rating, r.content, r.author_name,
           r.author_role, r.submitted_at
    FROM project_reviews r
    JOIN projects p ON p.id = r.project_id
    WHERE r.published = 1 AND r.submitted_at IS NOT NULL"#;

#[async_trait]
impl ReviewRepository for SqlxReviewRepository {
    async fn create(&self, project_id: i64, client_id: i64, token: &str, expires_at: DateTime<Utc>) -> Result<ProjectReview> {
        let now = Utc::now();
        let sql = r#"
            INSERT INTO project_reviews (project_id, client_id, token, expires_at, published, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)"#;
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(project_id)
                .bind(client_id)
                .bind(token)
                .bind(expires_at)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to create review link")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(project_id)
                .bind(client_id)
                .bind(token)
                .bind(expires_at)
                .bind(false)
                .bind(now)
                .bind(now)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to create review link")?
                .last_insert_id() as i64,
        };

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Review not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ProjectReview>> {
        let mut filter = SqlFilter::new();
        filter.eq("r.id", id);
        Ok(self.select(&filter, "r.id ASC", None).await?.into_iter().next())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<ProjectReview>> {
        let mut filter = SqlFilter::new();
        filter.eq("r.token", token);
        Ok(self.select(&filter, "r.id ASC", None).await?.into_iter().next())
    }

    async fn list(&self, filter: &SqlFilter, order_by: &str, params: &ListParams) -> Result<(Vec<ProjectReview>, i64)> {
        let total = self.count(filter).await?;
        let items = self.select(filter, order_by, Some(params)).await?;
        Ok((items, total))
    }

    async fn count(&self, filter: &SqlFilter) -> Result<i64> {
        let driver = self.pool.driver();
        let sql = format!("SELECT COUNT(*) as count {}{}", REVIEW_FROM, filter.where_sql(driver));
        let binds = filter.binds(driver);
        let count = match driver {
            DatabaseDriver::Sqlite => bind_sqlite(sqlx::query(&sql), &binds)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count reviews")?
                .get::<i64, _>("count"),
            DatabaseDriver::Mysql => bind_mysql(sqlx::query(&sql), &binds)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count reviews")?
                .get::<i64, _>("count"),
        };
        Ok(count)
    }

    async fn update(&self, review: &ProjectReview) -> Result<ProjectReview> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPDATE_SQL)
                    .bind(review.rating)
                    .bind(&review.content)
                    .bind(&review.author_name)
                    .bind(&review.author_role)
                    .bind(review.published)
                    .bind(now)
                    .bind(review.id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to update review")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPDATE_SQL)
                    .bind(review.rating)
                    .bind(&review.content)
                    .bind(&review.author_name)
                    .bind(&review.author_role)
                    .bind(review.published)
                    .bind(now)
                    .bind(review.id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to update review")?;
            }
        }
        self.get_by_id(review.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Review not found after update"))
    }

    async fn submit(&self, token: &str, submission: &ReviewSubmission, now: DateTime<Utc>) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SUBMIT_SQL)
                .bind(submission.rating)
                .bind(&submission.content)
                .bind(&submission.author_name)
                .bind(&submission.author_role)
                .bind(now)
                .bind(now)
                .bind(token)
                .bind(now)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to submit review")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SUBMIT_SQL)
                .bind(submission.rating)
                .bind(&submission.content)
                .bind(&submission.author_name)
                .bind(&submission.author_role)
                .bind(now)
                .bind(now)
                .bind(token)
                .bind(now)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to submit review")?
                .rows_affected(),
        };
        Ok(affected == 1)
    }

    async fn regenerate(&self, id: i64, token: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(REGENERATE_SQL)
                .bind(token)
                .bind(expires_at)
                .bind(now)
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to regenerate review link")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(REGENERATE_SQL)
                .bind(token)
                .bind(expires_at)
                .bind(now)
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to regenerate review link")?
                .rows_affected(),
        };
        Ok(affected == 1)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM project_reviews WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to delete review")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM project_reviews WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to delete review")?;
            }
        }
        Ok(())
    }

    async fn list_testimonials(&self, project_id: Option<i64>, limit: i64) -> Result<Vec<Testimonial>> {
        let mut sql = TESTIMONIAL_SELECT.to_string();
        if project_id.is_some() {
            sql.push_str(" AND r.project_id = ?");
        }
        sql.push_str(" ORDER BY r.submitted_at DESC, r.id DESC LIMIT ?");

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                if let Some(project_id) = project_id {
                    query = query.bind(project_id);
                }
                let rows = query
                    .bind(limit)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list testimonials")?;
                Ok(rows.iter().map(row_to_testimonial_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                if let Some(project_id) = project_id {
                    query = query.bind(project_id);
                }
                let rows = query
                    .bind(limit)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list testimonials")?;
                Ok(rows.iter().map(row_to_testimonial_mysql).collect())
            }
        }
    }
}

impl SqlxReviewRepository {
    async fn select(&self, filter: &SqlFilter, order_by: &str, params: Option<&ListParams>) -> Result<Vec<ProjectReview>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => select_sqlite(self.pool.as_sqlite().unwrap(), filter, order_by, params).await,
            DatabaseDriver::Mysql => select_mysql(self.pool.as_mysql().unwrap(), filter, order_by, params).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn select_sqlite(
    pool: &SqlitePool,
    filter: &SqlFilter,
    order_by: &str,
    params: Option<&ListParams>,
) -> Result<Vec<ProjectReview>> {
    let mut sql = format!("{}{} ORDER BY {}", REVIEW_SELECT, filter.where_sql(DatabaseDriver::Sqlite), order_by);
    if params.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
    }
    let mut query = bind_sqlite(sqlx::query(&sql), &filter.binds(DatabaseDriver::Sqlite));
    if let Some(params) = params {
        query = query.bind(params.limit()).bind(params.offset());
    }
    let rows = query.fetch_all(pool).await.context("Failed to list reviews")?;
    Ok(rows.iter().map(row_to_review_sqlite).collect())
}

fn row_to_review_sqlite(row: &sqlx::sqlite::SqliteRow) -> ProjectReview {
    ProjectReview {
        id: row.get("id"),
        project_id: row.get("project_id"),
        client_id: row.get("client_id"),
        token: row.get("token"),
        expires_at: row.get("expires_at"),
        submitted_at: row.get("submitted_at"),
        rating: row.get("rating"),
        content: row.get("content"),
        author_name: row.get("author_name"),
        author_role: row.get("author_role"),
        published: row.get("published"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        project_title: row.get("project_title"),
        client_name: row.get("client_name"),
    }
}

fn row_to_testimonial_sqlite(row: &sqlx::sqlite::SqliteRow) -> Testimonial {
    Testimonial {
        id: row.get("id"),
        project_id: row.get("project_id"),
        project_title: row.get("project_title"),
        rating: row.get::<Option<i32>, _>("rating").unwrap_or_default(),
        content: row.get::<Option<String>, _>("content").unwrap_or_default(),
        author_name: row.get::<Option<String>, _>("author_name").unwrap_or_default(),
        author_role: row.get("author_role"),
        submitted_at: row.get("submitted_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn select_mysql(
    pool: &MySqlPool,
    filter: &SqlFilter,
    order_by: &str,
    params: Option<&ListParams>,
) -> Result<Vec<ProjectReview>> {
    let mut sql = format!("{}{} ORDER BY {}", REVIEW_SELECT, filter.where_sql(DatabaseDriver::Mysql), order_by);
    if params.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
    }
    let mut query = bind_mysql(sqlx::query(&sql), &filter.binds(DatabaseDriver::Mysql));
    if let Some(params) = params {
        query = query.bind(params.limit()).bind(params.offset());
    }
    let rows = query.fetch_all(pool).await.context("Failed to list reviews")?;
    Ok(rows.iter().map(row_to_review_mysql).collect())
}

fn row_to_review_mysql(row: &sqlx::mysql::MySqlRow) -> ProjectReview {
    ProjectReview {
        id: row.get("id"),
        project_id: row.get("project_id"),
        client_id: row.get("client_id"),
        token: row.get("token"),
        expires_at: row.get("expires_at"),
        submitted_at: row.get("submitted_at"),
        rating: row.get("rating"),
        content: row.get("content"),
        author_name: row.get("author_name"),
        author_role: row.get("author_role"),
        published: row.get("published"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        project_title: row.get("project_title"),
        client_name: row.get("client_name"),
    }
}

fn row_to_testimonial_mysql(row: &sqlx::mysql::MySqlRow) -> Testimonial {
    Testimonial {
        id: row.get("id"),
        project_id: row.get("project_id"),
        project_title: row.get("project_title"),
        rating: row.get::<Option<i32>, _>("rating").unwrap_or_default(),
        content: row.get::<Option<String>, _>("content").unwrap_or_default(),
        author_name: row.get::<Option<String>, _>("author_name").unwrap_or_default(),
        author_role: row.get("author_role"),
        submitted_at: row.get("submitted_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxReviewRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO clients (id, name) VALUES (1, 'Acme')").await.unwrap();
        pool.execute("INSERT INTO projects (id, slug, locale, title, content, content_html) VALUES (1, 'site', 'fr', 'Acme site', '', '')")
            .await
            .unwrap();
        let repo = SqlxReviewRepository::new(pool.clone());
        (pool, repo)
    }

    fn submission() -> ReviewSubmission {
        ReviewSubmission {
            rating: 5,
            content: "Great work, on time.".to_string(),
            author_name: "Jane".to_string(),
            author_role: Some("CEO".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_joins_names() {
        let (_pool, repo) = setup_test_repo().await;
        let review = repo
            .create(1, 1, "tok-1", Utc::now() + Duration::days(30))
            .await
            .unwrap();
        assert_eq!(review.project_title.as_deref(), Some("Acme site"));
        assert_eq!(review.client_name.as_deref(), Some("Acme"));
        assert!(!review.is_submitted());

        let by_token = repo.get_by_token("tok-1").await.unwrap().unwrap();
        assert_eq!(by_token.id, review.id);
    }

    #[tokio::test]
    async fn test_submit_is_single_use() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(1, 1, "tok", Utc::now() + Duration::days(1)).await.unwrap();

        assert!(repo.submit("tok", &submission(), Utc::now()).await.unwrap());
        assert!(!repo.submit("tok", &submission(), Utc::now()).await.unwrap());

        let stored = repo.get_by_token("tok").await.unwrap().unwrap();
        assert_eq!(stored.rating, Some(5));
        assert!(stored.submitted_at.is_some());
    }

    #[tokio::test]
    async fn test_submit_rejected_after_expiry() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(1, 1, "old", Utc::now() - Duration::hours(1)).await.unwrap();
        assert!(!repo.submit("old", &submission(), Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_regenerate_only_when_pending() {
        let (_pool, repo) = setup_test_repo().await;
        let review = repo.create(1, 1, "a", Utc::now() - Duration::days(1)).await.unwrap();

        let expires = Utc::now() + Duration::days(10);
        assert!(repo.regenerate(review.id, "b", expires).await.unwrap());
        assert!(repo.get_by_token("a").await.unwrap().is_none());
        assert!(repo.submit("b", &submission(), Utc::now()).await.unwrap());

        assert!(!repo.regenerate(review.id, "c", expires).await.unwrap());
    }

    #[tokio::test]
    async fn test_testimonials_require_publication() {
        let (_pool, repo) = setup_test_repo().await;
        let review = repo.create(1, 1, "t", Utc::now() + Duration::days(1)).await.unwrap();
        repo.submit("t", &submission(), Utc::now()).await.unwrap();
        assert!(repo.list_testimonials(None, 10).await.unwrap().is_empty());

        let mut stored = repo.get_by_id(review.id).await.unwrap().unwrap();
        stored.published = true;
        repo.update(&stored).await.unwrap();

        let testimonials = repo.list_testimonials(Some(1), 10).await.unwrap();
        assert_eq!(testimonials.len(), 1);
        assert_eq!(testimonials[0].author_name, "Jane");
        assert!(repo.list_testimonials(Some(2), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_with_state_filter() {
        let (_pool, repo) = setup_test_repo().await;
        let now = Utc::now();
        repo.create(1, 1, "p", now + Duration::days(1)).await.unwrap();
        repo.create(1, 1, "e", now - Duration::days(1)).await.unwrap();

        let mut expired = SqlFilter::new();
        expired.push("r.submitted_at IS NULL AND r.expires_at < ?", [now.into()]);
        assert_eq!(repo.count(&expired).await.unwrap(), 1);
        assert_eq!(repo.count(&SqlFilter::new()).await.unwrap(), 2);
    }
}
