//! Language service
//!
//! Languages are referenced by code from blogs and projects, so the code is
//! fixed once created. Exactly one language is the default at any time.
//! The sitemap and home payloads depend on the language list, so writes
//! clear them from the cache.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::LanguageRepository;
use crate::models::{CreateLanguageInput, Language, UpdateLanguageInput};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2}(-[a-z]{2,})?$").expect("valid language code regex"));

#[derive(Debug, thiserror::Error)]
pub enum LanguageServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Language not found: {0}")]
    NotFound(String),

    #[error("Language code already exists: {0}")]
    DuplicateCode(String),

    #[error("The default language cannot be deleted")]
    CannotDeleteDefault,

    /// Still referenced by blogs or projects
    #[error("Language '{0}' is used by {1} blog(s) or project(s)")]
    InUse(String, i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct LanguageService {
    repo: Arc<dyn LanguageRepository>,
    cache: Arc<Cache>,
}

impl LanguageService {
    pub fn new(repo: Arc<dyn LanguageRepository>, cache: Arc<Cache>) -> Self {
        Self { repo, cache }
    }

    /// Default language first, then by code
    pub async fn list(&self) -> Result<Vec<Language>, LanguageServiceError> {
        Ok(self.repo.list().await.context("Failed to list languages")?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Language, LanguageServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get language")?
            .ok_or_else(|| LanguageServiceError::NotFound(id.to_string()))
    }

    pub async fn exists(&self, code: &str) -> Result<bool, LanguageServiceError> {
        Ok(self
            .repo
            .get_by_code(code)
            .await
            .context("Failed to get language by code")?
            .is_some())
    }

    /// Code of the default language
    pub async fn default_code(&self) -> Result<String, LanguageServiceError> {
        let language = self
            .repo
            .get_default()
            .await
            .context("Failed to get default language")?
            .ok_or_else(|| LanguageServiceError::NotFound("default".to_string()))?;
        Ok(language.code)
    }

    /// The requested code when it is a known language, the default otherwise
    pub async fn resolve_locale(&self, requested: Option<&str>) -> Result<String, LanguageServiceError> {
        if let Some(code) = requested.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty()) {
            if self.exists(&code).await? {
                return Ok(code);
            }
        }
        self.default_code().await
    }

    pub async fn create(&self, input: CreateLanguageInput) -> Result<Language, LanguageServiceError> {
        let code = normalize_code(&input.code)?;
        let name = validate_name(&input.name)?;

        if self.exists(&code).await? {
            return Err(LanguageServiceError::DuplicateCode(code));
        }

        let created = self
            .repo
            .create(&code, &name)
            .await
            .context("Failed to create language")?;

        if input.is_default {
            self.repo
                .set_default(created.id)
                .await
                .context("Failed to set default language")?;
        }
        tracing::info!(code = %created.code, "language created");
        self.invalidate().await;
        self.get_by_id(created.id).await
    }

    /// Rename and/or make default. Clearing the default flag is not
    /// possible directly: another language has to become the default.
    pub async fn update(&self, id: i64, input: UpdateLanguageInput) -> Result<Language, LanguageServiceError> {
        let existing = self.get_by_id(id).await?;

        if let Some(name) = input.name {
            let name = validate_name(&name)?;
            self.repo
                .update_name(id, &name)
                .await
                .context("Failed to rename language")?;
        }

        match input.is_default {
            Some(true) if !existing.is_default => {
                self.repo
                    .set_default(id)
                    .await
                    .context("Failed to set default language")?;
                tracing::info!(code = %existing.code, "default language changed");
            }
            Some(false) if existing.is_default => {
                return Err(LanguageServiceError::ValidationError(
                    "Choose another default language instead of unsetting this one".to_string(),
                ));
            }
            _ => {}
        }

        self.invalidate().await;
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), LanguageServiceError> {
        let language = self.get_by_id(id).await?;
        if language.is_default {
            return Err(LanguageServiceError::CannotDeleteDefault);
        }

        let used = self
            .repo
            .usage_count(&language.code)
            .await
            .context("Failed to count language usage")?;
        if used > 0 {
            return Err(LanguageServiceError::InUse(language.code, used));
        }

        self.repo.delete(id).await.context("Failed to delete language")?;
        tracing::info!(code = %language.code, "language deleted");
        self.invalidate().await;
        Ok(())
    }

    async fn invalidate(&self) {
        for pattern in ["home:*", "sitemap"] {
            if let Err(e) = self.cache.delete_pattern(pattern).await {
                tracing::warn!("Failed to invalidate cache {}: {}", pattern, e);
            }
        }
    }
}

fn normalize_code(code: &str) -> Result<String, LanguageServiceError> {
    let code = code.trim().to_lowercase();
    if code.len() < 2 || code.len() > 10 || !CODE_RE.is_match(&code) {
        return Err(LanguageServiceError::ValidationError(format!(
            "Invalid language code '{}'",
            code
        )));
    }
    Ok(code)
}

fn validate_name(name: &str) -> Result<String, LanguageServiceError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 50 {
        return Err(LanguageServiceError::ValidationError(
            "Language name must be 1 to 50 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::SqlxLanguageRepository;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use std::time::Duration;

    async fn setup_test_service() -> (DynDatabasePool, LanguageService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        let service = LanguageService::new(
            SqlxLanguageRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
        );
        (pool, service)
    }

    fn input(code: &str, is_default: bool) -> CreateLanguageInput {
        CreateLanguageInput {
            code: code.to_string(),
            name: format!("Lang {}", code),
            is_default,
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" DE ").unwrap(), "de");
        assert_eq!(normalize_code("pt-BR").unwrap(), "pt-br");
        assert!(normalize_code("f").is_err());
        assert!(normalize_code("french").is_err());
        assert!(normalize_code("fr_FR").is_err());
    }

    #[tokio::test]
    async fn test_resolve_locale() {
        let (_pool, service) = setup_test_service().await;
        assert_eq!(service.resolve_locale(Some("en")).await.unwrap(), "en");
        assert_eq!(service.resolve_locale(Some("EN")).await.unwrap(), "en");
        assert_eq!(service.resolve_locale(Some("xx")).await.unwrap(), "fr");
        assert_eq!(service.resolve_locale(None).await.unwrap(), "fr");
    }

    #[tokio::test]
    async fn test_create_duplicate_code() {
        let (_pool, service) = setup_test_service().await;
        service.create(input("de", false)).await.unwrap();
        assert!(matches!(
            service.create(input("DE", false)).await,
            Err(LanguageServiceError::DuplicateCode(_))
        ));
    }

    #[tokio::test]
    async fn test_single_default() {
        let (_pool, service) = setup_test_service().await;
        let de = service.create(input("de", true)).await.unwrap();
        assert!(de.is_default);

        let defaults: Vec<_> = service
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter(|l| l.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].code, "de");

        let unset = service
            .update(de.id, UpdateLanguageInput { name: None, is_default: Some(false) })
            .await;
        assert!(matches!(unset, Err(LanguageServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let (pool, service) = setup_test_service().await;
        let languages = service.list().await.unwrap();
        let fr = languages.iter().find(|l| l.code == "fr").unwrap();
        let en = languages.iter().find(|l| l.code == "en").unwrap();

        assert!(matches!(
            service.delete(fr.id).await,
            Err(LanguageServiceError::CannotDeleteDefault)
        ));

        pool.execute(
            "INSERT INTO blogs (slug, locale, title, content, content_html, status, created_at, updated_at) \
             VALUES ('hello', 'en', 'Hello', '', '', 'draft', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
        )
        .await
        .unwrap();
        assert!(matches!(
            service.delete(en.id).await,
            Err(LanguageServiceError::InUse(_, 1))
        ));

        let de = service.create(input("de", false)).await.unwrap();
        service.delete(de.id).await.unwrap();
        assert!(!service.exists("de").await.unwrap());
    }

    const PUBLIC_KEYS: [&str; 3] = ["sitemap", "home:fr", "home:en"];

    async fn fill(cache: &MemoryCache) {
        for key in PUBLIC_KEYS {
            cache.set(key, &"stale".to_string(), Duration::from_secs(60)).await.unwrap();
        }
    }

    async fn assert_cleared(cache: &MemoryCache) {
        for key in PUBLIC_KEYS {
            assert_eq!(cache.get::<String>(key).await.unwrap(), None, "{}", key);
        }
    }

    #[tokio::test]
    async fn test_writes_clear_sitemap_and_home() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let cache = Arc::new(MemoryCache::new());
        let service = LanguageService::new(SqlxLanguageRepository::boxed(pool), cache.clone());

        fill(&cache).await;
        let de = service.create(input("de", false)).await.unwrap();
        assert_cleared(&cache).await;

        fill(&cache).await;
        service
            .update(de.id, UpdateLanguageInput { name: Some("Deutsch".into()), is_default: None })
            .await
            .unwrap();
        assert_cleared(&cache).await;

        fill(&cache).await;
        service.delete(de.id).await.unwrap();
        assert_cleared(&cache).await;

        // A rejected write leaves the cache alone
        service.create(input("de", false)).await.unwrap();
        fill(&cache).await;
        assert!(service.create(input("DE", false)).await.is_err());
        assert_eq!(cache.get::<String>("sitemap").await.unwrap(), Some("stale".to_string()));
    }
}
