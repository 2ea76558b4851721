//! Client repository

use crate::config::DatabaseDriver;
use crate::db::query::{bind_mysql, bind_sqlite, SqlFilter};
use crate::db::DynDatabasePool;
use crate::models::{Client, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn create(&self, client: &Client) -> Result<Client>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Client>>;
    /// Filtered page plus the total count of matching rows
    async fn list(&self, filter: &SqlFilter, order_by: &str, params: &ListParams) -> Result<(Vec<Client>, i64)>;
    async fn update(&self, client: &Client) -> Result<Client>;
    /// Delete; projects are detached and review links removed
    async fn delete(&self, id: i64) -> Result<()>;
    async fn count(&self) -> Result<i64>;
}

pub struct SqlxClientRepository {
    pool: DynDatabasePool,
}

impl SqlxClientRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ClientRepository> {
        Arc::new(Self::new(pool))
    }
}

const CLIENT_COLUMNS: &str =
    "id, name, company, email, phone, website, logo_url, notes, created_at, updated_at";

#[async_trait]
impl ClientRepository for SqlxClientRepository {
    async fn create(&self, client: &Client) -> Result<Client> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), client).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), client).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Client>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list(&self, filter: &SqlFilter, order_by: &str, params: &ListParams) -> Result<(Vec<Client>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.as_sqlite().unwrap(), filter, order_by, params).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap(), filter, order_by, params).await,
        }
    }

    async fn update(&self, client: &Client) -> Result<Client> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(self.pool.as_sqlite().unwrap(), client).await,
            DatabaseDriver::Mysql => update_mysql(self.pool.as_mysql().unwrap(), client).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM clients WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to delete client")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query("DELETE FROM clients WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to delete client")?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("SELECT COUNT(*) as count FROM clients")
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await?
                .get::<i64, _>("count"),
            DatabaseDriver::Mysql => sqlx::query("SELECT COUNT(*) as count FROM clients")
                .fetch_one(self.pool.as_mysql().unwrap())
                .await?
                .get::<i64, _>("count"),
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, client: &Client) -> Result<Client> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO clients (name, company, email, phone, website, logo_url, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&client.name)
    .bind(&client.company)
    .bind(&client.email)
    .bind(&client.phone)
    .bind(&client.website)
    .bind(&client.logo_url)
    .bind(&client.notes)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create client")?;

    Ok(Client {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..client.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Client>> {
    let sql = format!("SELECT {} FROM clients WHERE id = ?", CLIENT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get client")?;
    Ok(row.map(|r| row_to_client_sqlite(&r)))
}

async fn list_sqlite(
    pool: &SqlitePool,
    filter: &SqlFilter,
    order_by: &str,
    params: &ListParams,
) -> Result<(Vec<Client>, i64)> {
    let where_sql = filter.where_sql(DatabaseDriver::Sqlite);

    let count_sql = format!("SELECT COUNT(*) as count FROM clients{}", where_sql);
    let total: i64 = bind_sqlite(sqlx::query(&count_sql), &filter.binds(DatabaseDriver::Sqlite))
        .fetch_one(pool)
        .await
        .context("Failed to count clients")?
        .get("count");

    let sql = format!(
        "SELECT {} FROM clients{} ORDER BY {} LIMIT ? OFFSET ?",
        CLIENT_COLUMNS, where_sql, order_by
    );
    let rows = bind_sqlite(sqlx::query(&sql), &filter.binds(DatabaseDriver::Sqlite))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list clients")?;

    Ok((rows.iter().map(row_to_client_sqlite).collect(), total))
}

async fn update_sqlite(pool: &SqlitePool, client: &Client) -> Result<Client> {
    sqlx::query(
        r#"
        UPDATE clients
        SET name = ?, company = ?, email = ?, phone = ?, website = ?, logo_url = ?, notes = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&client.name)
    .bind(&client.company)
    .bind(&client.email)
    .bind(&client.phone)
    .bind(&client.website)
    .bind(&client.logo_url)
    .bind(&client.notes)
    .bind(Utc::now())
    .bind(client.id)
    .execute(pool)
    .await
    .context("Failed to update client")?;

    get_by_id_sqlite(pool, client.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Client not found after update"))
}

fn row_to_client_sqlite(row: &sqlx::sqlite::SqliteRow) -> Client {
    Client {
        id: row.get("id"),
        name: row.get("name"),
        company: row.get("company"),
        email: row.get("email"),
        phone: row.get("phone"),
        website: row.get("website"),
        logo_url: row.get("logo_url"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, client: &Client) -> Result<Client> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO clients (name, company, email, phone, website, logo_url, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&client.name)
    .bind(&client.company)
    .bind(&client.email)
    .bind(&client.phone)
    .bind(&client.website)
    .bind(&client.logo_url)
    .bind(&client.notes)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create client")?;

    Ok(Client {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..client.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Client>> {
    let sql = format!("SELECT {} FROM clients WHERE id = ?", CLIENT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get client")?;
    Ok(row.map(|r| row_to_client_mysql(&r)))
}

async fn list_mysql(
    pool: &MySqlPool,
    filter: &SqlFilter,
    order_by: &str,
    params: &ListParams,
) -> Result<(Vec<Client>, i64)> {
    let where_sql = filter.where_sql(DatabaseDriver::Mysql);

    let count_sql = format!("SELECT COUNT(*) as count FROM clients{}", where_sql);
    let total: i64 = bind_mysql(sqlx::query(&count_sql), &filter.binds(DatabaseDriver::Mysql))
        .fetch_one(pool)
        .await
        .context("Failed to count clients")?
        .get("count");

    let sql = format!(
        "SELECT {} FROM clients{} ORDER BY {} LIMIT ? OFFSET ?",
        CLIENT_COLUMNS, where_sql, order_by
    );
    let rows = bind_mysql(sqlx::query(&sql), &filter.binds(DatabaseDriver::Mysql))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list clients")?;

    Ok((rows.iter().map(row_to_client_mysql).collect(), total))
}

async fn update_mysql(pool: &MySqlPool, client: &Client) -> Result<Client> {
    sqlx::query(
        r#"
        UPDATE clients
        SET name = ?, company = ?, email = ?, phone = ?, website = ?, logo_url = ?, notes = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&client.name)
    .bind(&client.company)
    .bind(&client.email)
    .bind(&client.phone)
    .bind(&client.website)
    .bind(&client.logo_url)
    .bind(&client.notes)
    .bind(Utc::now())
    .bind(client.id)
    .execute(pool)
    .await
    .context("Failed to update client")?;

    get_by_id_mysql(pool, client.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Client not found after update"))
}

fn row_to_client_mysql(row: &sqlx::mysql::MySqlRow) -> Client {
    Client {
        id: row.get("id"),
        name: row.get("name"),
        company: row.get("company"),
        email: row.get("email"),
        phone: row.get("phone"),
        website: row.get("website"),
        logo_url: row.get("logo_url"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
