//! Blog service
//!
//! Admin CRUD over the grid, and the cached public views. Every write
//! invalidates the `blogs:*`, `home:*` and `sitemap` cache entries.
//!
//! Slugs are unique per locale: the same slug may exist once in `fr` and
//! once in `en`.

use crate::cache::{Cache, CacheLayer};
use crate::db::is_unique_violation;
use crate::db::query::SqlFilter;
use crate::db::repositories::{BlogRepository, CategoryRepository};
use crate::models::{
    Blog, BlogFilter, BlogInput, GridQuery, ListParams, PagedResult, PublicFilter, PublishStatus,
    ADMIN_PER_PAGE, PUBLIC_PER_PAGE,
};
use crate::services::language::LanguageService;
use crate::services::markdown::MarkdownRenderer;
use crate::services::slug::{generate_slug, is_valid_slug};
use crate::services::validation::normalize_optional;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

const SORTABLE: &[(&str, &str)] = &[
    ("title", "title"),
    ("created_at", "created_at"),
    ("updated_at", "updated_at"),
    ("published_at", "published_at"),
    ("status", "status"),
];

const SEARCHABLE: &[&str] = &["title", "excerpt"];

const PUBLIC_ORDER: &str = "published_at DESC, id DESC";

const MAX_TITLE_LEN: usize = 255;
const AUTO_EXCERPT_LEN: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum BlogServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Slug '{0}' is already used in this language")]
    DuplicateSlug(String),

    #[error("Blog not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct BlogService {
    repo: Arc<dyn BlogRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    languages: Arc<LanguageService>,
    cache: Arc<Cache>,
    markdown: MarkdownRenderer,
    cache_ttl: Duration,
}

impl BlogService {
    pub fn new(
        repo: Arc<dyn BlogRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        languages: Arc<LanguageService>,
        cache: Arc<Cache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            category_repo,
            languages,
            cache,
            markdown: MarkdownRenderer::new(),
            cache_ttl,
        }
    }

    // ------------------------------------------------------------------
    // Admin
    // ------------------------------------------------------------------

    pub async fn admin_list(
        &self,
        query: &GridQuery,
        filter: &BlogFilter,
    ) -> Result<PagedResult<Blog>, BlogServiceError> {
        let params = query.params(ADMIN_PER_PAGE);
        let mut sql = SqlFilter::new();
        sql.eq_opt("locale", filter.locale.clone())
            .eq_opt("status", filter.status.map(|s| s.as_str()))
            .eq_opt("category_id", filter.category_id)
            .search(SEARCHABLE, query.search_term());
        let order_by = query.order_by(SORTABLE, "created_at", "id");

        let (items, total) = self
            .repo
            .list(&sql, &order_by, &params)
            .await
            .context("Failed to list blogs")?;
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Blog, BlogServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get blog")?
            .ok_or_else(|| BlogServiceError::NotFound(id.to_string()))
    }

    pub async fn create(&self, input: BlogInput, author_id: Option<i64>) -> Result<Blog, BlogServiceError> {
        let now = Utc::now();
        let draft = Blog {
            id: 0,
            slug: String::new(),
            locale: String::new(),
            title: String::new(),
            excerpt: None,
            content: String::new(),
            content_html: String::new(),
            cover_image: None,
            category_id: None,
            author_id,
            status: PublishStatus::Draft,
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        let blog = self.apply_input(draft, input, None).await?;
        let created = self.repo.create(&blog).await.map_err(|e| write_error(e, &blog.slug))?;
        self.invalidate().await;
        tracing::info!(id = created.id, locale = %created.locale, slug = %created.slug, "blog created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: BlogInput) -> Result<Blog, BlogServiceError> {
        let existing = self.get_by_id(id).await?;
        let mut blog = self.apply_input(existing, input, Some(id)).await?;
        blog.updated_at = Utc::now();
        let updated = self.repo.update(&blog).await.map_err(|e| write_error(e, &blog.slug))?;
        self.invalidate().await;
        tracing::info!(id, status = %updated.status, "blog updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), BlogServiceError> {
        self.get_by_id(id).await?;
        self.repo.delete(id).await.context("Failed to delete blog")?;
        self.invalidate().await;
        tracing::info!(id, "blog deleted");
        Ok(())
    }

    /// Count for the dashboard, optionally by status
    pub async fn count(&self, status: Option<PublishStatus>) -> Result<i64, BlogServiceError> {
        let mut filter = SqlFilter::new();
        filter.eq_opt("status", status.map(|s| s.as_str()));
        Ok(self.repo.count(&filter).await.context("Failed to count blogs")?)
    }

    // ------------------------------------------------------------------
    // Public
    // ------------------------------------------------------------------

    /// Published posts of one locale, newest first.
    ///
    /// Unknown or missing locales fall back to the default language.
    pub async fn list_published(
        &self,
        query: &GridQuery,
        public: &PublicFilter,
    ) -> Result<PagedResult<Blog>, BlogServiceError> {
        let locale = self.resolve_locale(public.locale.as_deref()).await?;
        let params = query.params(PUBLIC_PER_PAGE);
        let category = public.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let search = query.search_term();

        let cache_key = format!(
            "blogs:{}:list:{}:{}:{}",
            locale,
            category.unwrap_or("-"),
            params.page,
            params.per_page
        );
        if search.is_none() {
            if let Ok(Some(cached)) = self.cache.get::<PagedResult<Blog>>(&cache_key).await {
                return Ok(cached);
            }
        }

        let mut filter = published_filter(&locale);
        if let Some(slug) = category {
            filter.push(
                "category_id = (SELECT id FROM categories WHERE slug = ?)",
                [slug.into()],
            );
        }
        filter.search(SEARCHABLE, search);

        let (items, total) = self
            .repo
            .list(&filter, PUBLIC_ORDER, &params)
            .await
            .context("Failed to list published blogs")?;
        let result = PagedResult::new(items, total, &params);

        if search.is_none() {
            self.store(&cache_key, &result).await;
        }
        Ok(result)
    }

    /// Published post by locale and slug
    pub async fn get_published(&self, locale: &str, slug: &str) -> Result<Blog, BlogServiceError> {
        let cache_key = format!("blogs:{}:detail:{}", locale, slug);
        if let Ok(Some(cached)) = self.cache.get::<Blog>(&cache_key).await {
            return Ok(cached);
        }

        let blog = self
            .repo
            .get_by_slug(locale, slug)
            .await
            .context("Failed to get blog by slug")?
            .filter(|b| b.status == PublishStatus::Published)
            .ok_or_else(|| BlogServiceError::NotFound(format!("{}/{}", locale, slug)))?;

        self.store(&cache_key, &blog).await;
        Ok(blog)
    }

    /// Latest published posts for the home page
    pub async fn latest(&self, locale: &str, limit: u32) -> Result<Vec<Blog>, BlogServiceError> {
        let params = ListParams::new(1, limit);
        let (items, _) = self
            .repo
            .list(&published_filter(locale), PUBLIC_ORDER, &params)
            .await
            .context("Failed to list latest blogs")?;
        Ok(items)
    }

    /// Every published post across locales, for the sitemap
    pub async fn all_published(&self) -> Result<Vec<Blog>, BlogServiceError> {
        let mut filter = SqlFilter::new();
        filter.eq("status", PublishStatus::Published.as_str());
        Ok(self
            .repo
            .list_all(&filter, "locale ASC, published_at DESC, id DESC")
            .await
            .context("Failed to list published blogs")?)
    }

    // ------------------------------------------------------------------

    async fn resolve_locale(&self, requested: Option<&str>) -> Result<String, BlogServiceError> {
        Ok(self
            .languages
            .resolve_locale(requested)
            .await
            .map_err(anyhow::Error::from)?)
    }

    /// Validate `input` and merge it into `blog`
    async fn apply_input(
        &self,
        mut blog: Blog,
        input: BlogInput,
        exclude_id: Option<i64>,
    ) -> Result<Blog, BlogServiceError> {
        let title = input.title.trim().to_string();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(BlogServiceError::ValidationError(format!(
                "Title must be 1 to {} characters",
                MAX_TITLE_LEN
            )));
        }

        let locale = input.locale.trim().to_lowercase();
        if !self.languages.exists(&locale).await.map_err(anyhow::Error::from)? {
            return Err(BlogServiceError::ValidationError(format!("Unknown locale '{}'", locale)));
        }

        let slug = match normalize_optional(input.slug) {
            Some(slug) if is_valid_slug(&slug) => slug,
            Some(slug) => {
                return Err(BlogServiceError::ValidationError(format!("Invalid slug '{}'", slug)))
            }
            None => generate_slug(&title),
        };
        if slug.is_empty() {
            return Err(BlogServiceError::ValidationError(
                "Cannot derive a slug from this title, please provide one".to_string(),
            ));
        }
        if self
            .repo
            .slug_taken(&locale, &slug, exclude_id)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(BlogServiceError::DuplicateSlug(slug));
        }

        if let Some(category_id) = input.category_id {
            if self
                .category_repo
                .get_by_id(category_id)
                .await
                .context("Failed to get category")?
                .is_none()
            {
                return Err(BlogServiceError::ValidationError(format!(
                    "Category {} does not exist",
                    category_id
                )));
            }
        }

        blog.excerpt = normalize_optional(input.excerpt)
            .or_else(|| Some(self.markdown.excerpt(&input.content, AUTO_EXCERPT_LEN)))
            .filter(|e| !e.is_empty());
        blog.content_html = self.markdown.render(&input.content);
        blog.content = input.content;
        blog.title = title;
        blog.locale = locale;
        blog.slug = slug;
        blog.cover_image = normalize_optional(input.cover_image);
        blog.category_id = input.category_id;
        blog.status = input.status;
        if blog.status == PublishStatus::Published && blog.published_at.is_none() {
            blog.published_at = Some(Utc::now());
        }
        Ok(blog)
    }

    async fn store<T: serde::Serialize + Send + Sync>(&self, key: &str, value: &T) {
        if let Err(e) = self.cache.set(key, value, self.cache_ttl).await {
            tracing::warn!("Failed to cache {}: {}", key, e);
        }
    }

    async fn invalidate(&self) {
        for pattern in ["blogs:*", "home:*", "sitemap"] {
            if let Err(e) = self.cache.delete_pattern(pattern).await {
                tracing::warn!("Failed to invalidate cache {}: {}", pattern, e);
            }
        }
    }
}

/// A write that lost a slug race surfaces as the UNIQUE violation.
fn write_error(err: anyhow::Error, slug: &str) -> BlogServiceError {
    if is_unique_violation(&err) {
        BlogServiceError::DuplicateSlug(slug.to_string())
    } else {
        BlogServiceError::InternalError(err)
    }
}

fn published_filter(locale: &str) -> SqlFilter {
    let mut filter = SqlFilter::new();
    filter
        .eq("locale", locale)
        .eq("status", PublishStatus::Published.as_str());
    filter
}
