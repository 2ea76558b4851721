//! Category service
//!
//! Categories are shared by blogs and projects. Deleting one detaches its
//! content (the foreign keys are `ON DELETE SET NULL`).

use crate::cache::{Cache, CacheLayer};
use crate::db::is_unique_violation;
use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CategoryInput};
use crate::services::slug::{generate_slug, is_valid_slug};
use crate::services::validation::normalize_optional;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

const CACHE_KEY_LIST: &str = "categories:list";
const CATEGORY_CACHE_TTL_SECS: u64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Category not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<Cache>) -> Self {
        Self {
            repo,
            cache,
            cache_ttl: Duration::from_secs(CATEGORY_CACHE_TTL_SECS),
        }
    }

    /// All categories by name, cached
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<Category>>(CACHE_KEY_LIST).await {
            return Ok(cached);
        }
        let categories = self.repo.list().await.context("Failed to list categories")?;
        if let Err(e) = self.cache.set(CACHE_KEY_LIST, &categories, self.cache_ttl).await {
            tracing::warn!("Failed to cache category list: {}", e);
        }
        Ok(categories)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| CategoryServiceError::NotFound(id.to_string()))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_slug(slug)
            .await
            .context("Failed to get category by slug")?
            .ok_or_else(|| CategoryServiceError::NotFound(slug.to_string()))
    }

    pub async fn exists(&self, id: i64) -> Result<bool, CategoryServiceError> {
        Ok(self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .is_some())
    }

    pub async fn create(&self, input: CategoryInput) -> Result<Category, CategoryServiceError> {
        let (name, slug, description) = self.prepare(input, None).await?;
        let created = self
            .repo
            .create(&Category::new(slug.clone(), name, description))
            .await
            .map_err(|e| write_error(e, slug))?;
        self.invalidate().await;
        tracing::info!(id = created.id, slug = %created.slug, "category created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: CategoryInput) -> Result<Category, CategoryServiceError> {
        let existing = self.get_by_id(id).await?;
        let (name, slug, description) = self.prepare(input, Some(id)).await?;
        let updated = self
            .repo
            .update(&Category {
                name,
                slug: slug.clone(),
                description,
                ..existing
            })
            .await
            .map_err(|e| write_error(e, slug))?;
        self.invalidate().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        let existing = self.get_by_id(id).await?;
        self.repo.delete(id).await.context("Failed to delete category")?;
        self.invalidate().await;
        tracing::info!(id, slug = %existing.slug, "category deleted");
        Ok(())
    }

    async fn prepare(
        &self,
        input: CategoryInput,
        exclude_id: Option<i64>,
    ) -> Result<(String, String, Option<String>), CategoryServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(CategoryServiceError::ValidationError(
                "Category name must be 1 to 100 characters".to_string(),
            ));
        }

        let slug = match normalize_optional(input.slug) {
            Some(slug) => {
                if !is_valid_slug(&slug) {
                    return Err(CategoryServiceError::ValidationError(format!(
                        "Invalid slug '{}'",
                        slug
                    )));
                }
                slug
            }
            None => generate_slug(&name),
        };
        if slug.is_empty() {
            return Err(CategoryServiceError::ValidationError(
                "Cannot derive a slug from this name, please provide one".to_string(),
            ));
        }

        if self
            .repo
            .slug_taken(&slug, exclude_id)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(CategoryServiceError::DuplicateSlug(slug));
        }

        Ok((name, slug, normalize_optional(input.description)))
    }

    /// Category names and slugs appear in cached listings too
    async fn invalidate(&self) {
        for pattern in ["categories:*", "blogs:*", "projects:*", "home:*"] {
            if let Err(e) = self.cache.delete_pattern(pattern).await {
                tracing::warn!("Failed to invalidate cache {}: {}", pattern, e);
            }
        }
    }
}

fn write_error(err: anyhow::Error, slug: String) -> CategoryServiceError {
    if is_unique_violation(&err) {
        CategoryServiceError::DuplicateSlug(slug)
    } else {
        CategoryServiceError::InternalError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::SqlxCategoryRepository;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, CategoryService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        let service = CategoryService::new(
            SqlxCategoryRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
        );
        (pool, service)
    }

    fn input(name: &str, slug: Option<&str>) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            slug: slug.map(str::to_string),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_generates_slug() {
        let (_pool, service) = setup_test_service().await;
        let category = service.create(input("Développement Web", None)).await.unwrap();
        assert_eq!(category.slug, "developpement-web");
        assert_eq!(service.get_by_slug("developpement-web").await.unwrap().id, category.id);
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflict() {
        let (_pool, service) = setup_test_service().await;
        service.create(input("Design", None)).await.unwrap();
        let dup = service.create(input("Other", Some("design"))).await;
        assert!(matches!(dup, Err(CategoryServiceError::DuplicateSlug(_))));
    }

    /// Reports every slug as free, as when a concurrent write lands after the check.
    struct StaleSlugCheck(Arc<dyn CategoryRepository>);

    #[async_trait::async_trait]
    impl CategoryRepository for StaleSlugCheck {
        async fn create(&self, category: &Category) -> anyhow::Result<Category> {
            self.0.create(category).await
        }
        async fn get_by_id(&self, id: i64) -> anyhow::Result<Option<Category>> {
            self.0.get_by_id(id).await
        }
        async fn get_by_slug(&self, slug: &str) -> anyhow::Result<Option<Category>> {
            self.0.get_by_slug(slug).await
        }
        async fn list(&self) -> anyhow::Result<Vec<Category>> {
            self.0.list().await
        }
        async fn update(&self, category: &Category) -> anyhow::Result<Category> {
            self.0.update(category).await
        }
        async fn delete(&self, id: i64) -> anyhow::Result<()> {
            self.0.delete(id).await
        }
        async fn slug_taken(&self, _slug: &str, _exclude_id: Option<i64>) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_constraint_violation_is_duplicate_slug() {
        let (pool, _) = setup_test_service().await;
        let service = CategoryService::new(
            Arc::new(StaleSlugCheck(SqlxCategoryRepository::boxed(pool))),
            Arc::new(MemoryCache::new()),
        );
        service.create(input("Design", None)).await.unwrap();
        let dup = service.create(input("Design", None)).await;
        assert!(matches!(dup, Err(CategoryServiceError::DuplicateSlug(ref s)) if s == "design"));

        let other = service.create(input("Audit", None)).await.unwrap();
        let moved = service.update(other.id, input("Audit", Some("design"))).await;
        assert!(matches!(moved, Err(CategoryServiceError::DuplicateSlug(_))));
    }

    #[tokio::test]
    async fn test_update_keeps_own_slug() {
        let (_pool, service) = setup_test_service().await;
        let created = service.create(input("Design", None)).await.unwrap();
        let updated = service
            .update(created.id, input("Design & UX", Some("design")))
            .await
            .unwrap();
        assert_eq!(updated.name, "Design & UX");
        assert_eq!(updated.slug, "design");
    }

    #[tokio::test]
    async fn test_validation() {
        let (_pool, service) = setup_test_service().await;
        assert!(matches!(
            service.create(input("   ", None)).await,
            Err(CategoryServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(input("Ok", Some("Not Valid"))).await,
            Err(CategoryServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(input("???", None)).await,
            Err(CategoryServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_list_cache_invalidated_on_write() {
        let (_pool, service) = setup_test_service().await;
        assert!(service.list().await.unwrap().is_empty());
        service.create(input("Design", None)).await.unwrap();
        assert_eq!(service.list().await.unwrap().len(), 1);

        let id = service.list().await.unwrap()[0].id;
        service.delete(id).await.unwrap();
        assert!(service.list().await.unwrap().is_empty());
        assert!(matches!(
            service.delete(id).await,
            Err(CategoryServiceError::NotFound(_))
        ));
    }
}
