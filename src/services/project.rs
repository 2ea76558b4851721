//! Project (portfolio) service
//!
//! Same slug, locale and Markdown rules as blogs. Public ordering puts
//! featured projects first, then the manual `sort_order`, then newest.

use crate::cache::{Cache, CacheLayer};
use crate::db::is_unique_violation;
use crate::db::query::SqlFilter;
use crate::db::repositories::{CategoryRepository, ClientRepository, ProjectRepository, ReviewRepository};
use crate::models::{
    GridQuery, ListParams, PagedResult, Project, ProjectDetail, ProjectFilter, ProjectInput,
    PublicFilter, PublishStatus, ADMIN_PER_PAGE, PUBLIC_PER_PAGE,
};
use crate::services::language::LanguageService;
use crate::services::markdown::MarkdownRenderer;
use crate::services::slug::{generate_slug, is_valid_slug};
use crate::services::validation::{is_http_url, normalize_optional};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

const SORTABLE: &[(&str, &str)] = &[
    ("title", "title"),
    ("sort_order", "sort_order"),
    ("created_at", "created_at"),
    ("updated_at", "updated_at"),
];

const SEARCHABLE: &[&str] = &["title", "summary"];

pub const PORTFOLIO_ORDER: &str = "featured DESC, sort_order ASC, created_at DESC, id DESC";

/// Testimonials shown on a project page
const DETAIL_REVIEWS: i64 = 20;

const MAX_TITLE_LEN: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum ProjectServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Slug '{0}' is already used in this language")]
    DuplicateSlug(String),

    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ProjectService {
    repo: Arc<dyn ProjectRepository>,
    client_repo: Arc<dyn ClientRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    review_repo: Arc<dyn ReviewRepository>,
    languages: Arc<LanguageService>,
    cache: Arc<Cache>,
    markdown: MarkdownRenderer,
    cache_ttl: Duration,
}

impl ProjectService {
    pub fn new(
        repo: Arc<dyn ProjectRepository>,
        client_repo: Arc<dyn ClientRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        review_repo: Arc<dyn ReviewRepository>,
        languages: Arc<LanguageService>,
        cache: Arc<Cache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            client_repo,
            category_repo,
            review_repo,
            languages,
            cache,
            markdown: MarkdownRenderer::new(),
            cache_ttl,
        }
    }

    pub async fn admin_list(
        &self,
        query: &GridQuery,
        filter: &ProjectFilter,
    ) -> Result<PagedResult<Project>, ProjectServiceError> {
        let params = query.params(ADMIN_PER_PAGE);
        let mut sql = SqlFilter::new();
        sql.eq_opt("locale", filter.locale.clone())
            .eq_opt("status", filter.status.map(|s| s.as_str()))
            .eq_opt("client_id", filter.client_id)
            .eq_opt("category_id", filter.category_id)
            .eq_opt("featured", filter.featured)
            .search(SEARCHABLE, query.search_term());
        let order_by = query.order_by(SORTABLE, "created_at", "id");

        let (items, total) = self
            .repo
            .list(&sql, &order_by, &params)
            .await
            .context("Failed to list projects")?;
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Project, ProjectServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get project")?
            .ok_or_else(|| ProjectServiceError::NotFound(id.to_string()))
    }

    pub async fn create(&self, input: ProjectInput) -> Result<Project, ProjectServiceError> {
        let now = Utc::now();
        let draft = Project {
            id: 0,
            slug: String::new(),
            locale: String::new(),
            title: String::new(),
            summary: None,
            content: String::new(),
            content_html: String::new(),
            cover_image: None,
            url: None,
            client_id: None,
            category_id: None,
            status: PublishStatus::Draft,
            featured: false,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        };
        let project = self.apply_input(draft, input, None).await?;
        let created = self.repo.create(&project).await.map_err(|e| write_error(e, &project.slug))?;
        self.invalidate().await;
        tracing::info!(id = created.id, locale = %created.locale, slug = %created.slug, "project created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: ProjectInput) -> Result<Project, ProjectServiceError> {
        let existing = self.get_by_id(id).await?;
        let mut project = self.apply_input(existing, input, Some(id)).await?;
        project.updated_at = Utc::now();
        let updated = self.repo.update(&project).await.map_err(|e| write_error(e, &project.slug))?;
        self.invalidate().await;
        Ok(updated)
    }

    /// Also deletes the project's reviews
    pub async fn delete(&self, id: i64) -> Result<(), ProjectServiceError> {
        self.get_by_id(id).await?;
        self.repo.delete(id).await.context("Failed to delete project")?;
        self.invalidate().await;
        tracing::info!(id, "project deleted");
        Ok(())
    }

    pub async fn count(&self, status: Option<PublishStatus>) -> Result<i64, ProjectServiceError> {
        let mut filter = SqlFilter::new();
        filter.eq_opt("status", status.map(|s| s.as_str()));
        Ok(self.repo.count(&filter).await.context("Failed to count projects")?)
    }

    /// Published portfolio of one locale
    pub async fn list_published(
        &self,
        query: &GridQuery,
        public: &PublicFilter,
    ) -> Result<PagedResult<Project>, ProjectServiceError> {
        let locale = self.resolve_locale(public.locale.as_deref()).await?;
        let params = query.params(PUBLIC_PER_PAGE);
        let category = public.category.as_deref().map(str::trim).filter(|c| !c.is_empty());

        let cache_key = format!(
            "projects:{}:list:{}:{}:{}",
            locale,
            category.unwrap_or("-"),
            params.page,
            params.per_page
        );
        if let Ok(Some(cached)) = self.cache.get::<PagedResult<Project>>(&cache_key).await {
            return Ok(cached);
        }

        let mut filter = published_filter(&locale);
        if let Some(slug) = category {
            filter.push(
                "category_id = (SELECT id FROM categories WHERE slug = ?)",
                [slug.into()],
            );
        }

        let (items, total) = self
            .repo
            .list(&filter, PORTFOLIO_ORDER, &params)
            .await
            .context("Failed to list published projects")?;
        let result = PagedResult::new(items, total, &params);
        self.store(&cache_key, &result).await;
        Ok(result)
    }

    /// Published project with its client name and published testimonials
    pub async fn get_published(&self, locale: &str, slug: &str) -> Result<ProjectDetail, ProjectServiceError> {
        let cache_key = format!("projects:{}:detail:{}", locale, slug);
        if let Ok(Some(cached)) = self.cache.get::<ProjectDetail>(&cache_key).await {
            return Ok(cached);
        }

        let project = self
            .repo
            .get_by_slug(locale, slug)
            .await
            .context("Failed to get project by slug")?
            .filter(|p| p.status == PublishStatus::Published)
            .ok_or_else(|| ProjectServiceError::NotFound(format!("{}/{}", locale, slug)))?;

        let client_name = match project.client_id {
            Some(client_id) => self
                .client_repo
                .get_by_id(client_id)
                .await
                .context("Failed to get client")?
                .map(|c| c.name),
            None => None,
        };
        let reviews = self
            .review_repo
            .list_testimonials(Some(project.id), DETAIL_REVIEWS)
            .await
            .context("Failed to list project testimonials")?;

        let detail = ProjectDetail {
            project,
            client_name,
            reviews,
        };
        self.store(&cache_key, &detail).await;
        Ok(detail)
    }

    /// Featured published projects for the home page
    pub async fn featured(&self, locale: &str, limit: u32) -> Result<Vec<Project>, ProjectServiceError> {
        let mut filter = published_filter(locale);
        filter.eq("featured", true);
        let (items, _) = self
            .repo
            .list(&filter, PORTFOLIO_ORDER, &ListParams::new(1, limit))
            .await
            .context("Failed to list featured projects")?;
        Ok(items)
    }

    /// Every published project across locales, for the sitemap
    pub async fn all_published(&self) -> Result<Vec<Project>, ProjectServiceError> {
        let mut filter = SqlFilter::new();
        filter.eq("status", PublishStatus::Published.as_str());
        Ok(self
            .repo
            .list_all(&filter, "locale ASC, id ASC")
            .await
            .context("Failed to list published projects")?)
    }

    pub async fn exists(&self, id: i64) -> Result<bool, ProjectServiceError> {
        Ok(self.repo.get_by_id(id).await.context("Failed to get project")?.is_some())
    }

    async fn resolve_locale(&self, requested: Option<&str>) -> Result<String, ProjectServiceError> {
        Ok(self
            .languages
            .resolve_locale(requested)
            .await
            .map_err(anyhow::Error::from)?)
    }

    async fn apply_input(
        &self,
        mut project: Project,
        input: ProjectInput,
        exclude_id: Option<i64>,
    ) -> Result<Project, ProjectServiceError> {
        let title = input.title.trim().to_string();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(ProjectServiceError::ValidationError(format!(
                "Title must be 1 to {} characters",
                MAX_TITLE_LEN
            )));
        }

        let locale = input.locale.trim().to_lowercase();
        if !self.languages.exists(&locale).await.map_err(anyhow::Error::from)? {
            return Err(ProjectServiceError::ValidationError(format!("Unknown locale '{}'", locale)));
        }

        let slug = match normalize_optional(input.slug) {
            Some(slug) if is_valid_slug(&slug) => slug,
            Some(slug) => {
                return Err(ProjectServiceError::ValidationError(format!("Invalid slug '{}'", slug)))
            }
            None => generate_slug(&title),
        };
        if slug.is_empty() {
            return Err(ProjectServiceError::ValidationError(
                "Cannot derive a slug from this title, please provide one".to_string(),
            ));
        }
        if self
            .repo
            .slug_taken(&locale, &slug, exclude_id)
            .await
            .context("Failed to check slug uniqueness")?
        {
            return Err(ProjectServiceError::DuplicateSlug(slug));
        }

        let url = normalize_optional(input.url);
        if let Some(url) = &url {
            if !is_http_url(url) {
                return Err(ProjectServiceError::ValidationError(
                    "Project url must start with http:// or https://".to_string(),
                ));
            }
        }

        if let Some(client_id) = input.client_id {
            if self.client_repo.get_by_id(client_id).await.context("Failed to get client")?.is_none() {
                return Err(ProjectServiceError::ValidationError(format!(
                    "Client {} does not exist",
                    client_id
                )));
            }
        }
        if let Some(category_id) = input.category_id {
            if self
                .category_repo
                .get_by_id(category_id)
                .await
                .context("Failed to get category")?
                .is_none()
            {
                return Err(ProjectServiceError::ValidationError(format!(
                    "Category {} does not exist",
                    category_id
                )));
            }
        }

        project.content_html = self.markdown.render(&input.content);
        project.content = input.content;
        project.title = title;
        project.locale = locale;
        project.slug = slug;
        project.summary = normalize_optional(input.summary);
        project.cover_image = normalize_optional(input.cover_image);
        project.url = url;
        project.client_id = input.client_id;
        project.category_id = input.category_id;
        project.status = input.status;
        project.featured = input.featured;
        project.sort_order = input.sort_order;
        Ok(project)
    }

    async fn store<T: serde::Serialize + Send + Sync>(&self, key: &str, value: &T) {
        if let Err(e) = self.cache.set(key, value, self.cache_ttl).await {
            tracing::warn!("Failed to cache {}: {}", key, e);
        }
    }

    /// Public project pages embed testimonials, so review changes call this too
    pub async fn invalidate(&self) {
        for pattern in ["projects:*", "home:*", "sitemap"] {
            if let Err(e) = self.cache.delete_pattern(pattern).await {
                tracing::warn!("Failed to invalidate cache {}: {}", pattern, e);
            }
        }
    }
}

fn write_error(err: anyhow::Error, slug: &str) -> ProjectServiceError {
    if is_unique_violation(&err) {
        ProjectServiceError::DuplicateSlug(slug.to_string())
    } else {
        ProjectServiceError::InternalError(err)
    }
}

fn published_filter(locale: &str) -> SqlFilter {
    let mut filter = SqlFilter::new();
    filter
        .eq("locale", locale)
        .eq("status", PublishStatus::Published.as_str());
    filter
}
