//! Client service
//!
//! Client names and their reviews appear on public project pages, so every
//! update or delete clears the `projects:*`, `home:*` and `sitemap` entries.

use crate::cache::{Cache, CacheLayer};
use crate::db::query::SqlFilter;
use crate::db::repositories::ClientRepository;
use crate::models::{Client, ClientInput, GridQuery, PagedResult, ADMIN_PER_PAGE};
use crate::services::validation::{is_http_url, is_valid_email, is_valid_phone, normalize_optional};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const SORTABLE: &[(&str, &str)] = &[
    ("name", "name"),
    ("company", "company"),
    ("created_at", "created_at"),
    ("updated_at", "updated_at"),
];

const SEARCHABLE: &[&str] = &["name", "company", "email"];

#[derive(Debug, thiserror::Error)]
pub enum ClientServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Client not found: {0}")]
    NotFound(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ClientService {
    repo: Arc<dyn ClientRepository>,
    cache: Arc<Cache>,
}

impl ClientService {
    pub fn new(repo: Arc<dyn ClientRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    /// Admin grid: search over name, company and email
    pub async fn list(&self, query: &GridQuery) -> Result<PagedResult<Client>, ClientServiceError> {
        let params = query.params(ADMIN_PER_PAGE);
        let mut filter = SqlFilter::new();
        filter.search(SEARCHABLE, query.search_term());
        let order_by = query.order_by(SORTABLE, "created_at", "id");

        let (items, total) = self
            .repo
            .list(&filter, &order_by, &params)
            .await
            .context("Failed to list clients")?;
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Client, ClientServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get client")?
            .ok_or(ClientServiceError::NotFound(id))
    }

    pub async fn create(&self, input: ClientInput) -> Result<Client, ClientServiceError> {
        let now = Utc::now();
        let client = apply_input(
            Client {
                id: 0,
                name: String::new(),
                company: None,
                email: None,
                phone: None,
                website: None,
                logo_url: None,
                notes: None,
                created_at: now,
                updated_at: now,
            },
            input,
        )?;
        let created = self.repo.create(&client).await.context("Failed to create client")?;
        tracing::info!(id = created.id, "client created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: ClientInput) -> Result<Client, ClientServiceError> {
        let existing = self.get_by_id(id).await?;
        let mut client = apply_input(existing, input)?;
        client.updated_at = Utc::now();
        let updated = self.repo.update(&client).await.context("Failed to update client")?;
        self.invalidate().await;
        Ok(updated)
    }

    /// Projects are detached, the client's reviews are deleted
    pub async fn delete(&self, id: i64) -> Result<(), ClientServiceError> {
        self.get_by_id(id).await?;
        self.repo.delete(id).await.context("Failed to delete client")?;
        self.invalidate().await;
        tracing::info!(id, "client deleted");
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, ClientServiceError> {
        Ok(self.repo.count().await.context("Failed to count clients")?)
    }

    async fn invalidate(&self) {
        for pattern in ["projects:*", "home:*", "sitemap"] {
            if let Err(e) = self.cache.delete_pattern(pattern).await {
                tracing::warn!("Failed to invalidate cache {}: {}", pattern, e);
            }
        }
    }
}

fn apply_input(mut client: Client, input: ClientInput) -> Result<Client, ClientServiceError> {
    let name = input.name.trim().to_string();
    if name.is_empty() || name.chars().count() > 150 {
        return Err(ClientServiceError::ValidationError(
            "Client name must be 1 to 150 characters".to_string(),
        ));
    }

    let email = normalize_optional(input.email).map(|e| e.to_lowercase());
    if let Some(email) = &email {
        if !is_valid_email(email) {
            return Err(ClientServiceError::ValidationError(format!("Invalid email '{}'", email)));
        }
    }

    let phone = normalize_optional(input.phone);
    if let Some(phone) = &phone {
        if !is_valid_phone(phone) {
            return Err(ClientServiceError::ValidationError(format!("Invalid phone '{}'", phone)));
        }
    }

    let website = normalize_optional(input.website);
    if let Some(website) = &website {
        if !is_http_url(website) {
            return Err(ClientServiceError::ValidationError(
                "Website must start with http:// or https://".to_string(),
            ));
        }
    }

    client.name = name;
    client.company = normalize_optional(input.company);
    client.email = email;
    client.phone = phone;
    client.website = website;
    client.logo_url = normalize_optional(input.logo_url);
    client.notes = normalize_optional(input.notes);
    Ok(client)
}
