//! Public site information API
//!
//! - GET /api/site - Site name, languages, default locale
//! - GET /api/site/legal-notice - Legal notice from configuration
//! - GET /api/home - Home page data for a locale
//! - GET /api/health - Database ping
//! - GET /sitemap.xml

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::api::middleware::{ApiError, AppState};
use crate::cache::CacheLayer;
use crate::config::LegalNotice;
use crate::models::{Blog, Language, Project, Testimonial};
use crate::services::sitemap::build_sitemap;

const HOME_PROJECTS: u32 = 6;
const HOME_BLOGS: u32 = 3;
const HOME_TESTIMONIALS: i64 = 6;
const SITEMAP_CACHE_KEY: &str = "sitemap";

/// Response for public site info
#[derive(Debug, Serialize)]
pub struct SiteInfoResponse {
    pub version: String,
    pub name: String,
    pub base_url: String,
    pub contact_email: String,
    pub languages: Vec<Language>,
    pub default_locale: String,
    pub captcha_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct LegalNoticeResponse {
    pub site_name: String,
    pub contact_email: String,
    #[serde(flatten)]
    pub notice: LegalNotice,
}

#[derive(Debug, Deserialize)]
pub struct LocaleQuery {
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeResponse {
    pub locale: String,
    pub featured_projects: Vec<Project>,
    pub latest_blogs: Vec<Blog>,
    pub testimonials: Vec<Testimonial>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// Routes under /api
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/site", get(get_site_info))
        .route("/site/legal-notice", get(get_legal_notice))
        .route("/home", get(get_home))
        .route("/health", get(health))
}

/// GET /api/site
async fn get_site_info(State(state): State<AppState>) -> Result<Json<SiteInfoResponse>, ApiError> {
    let languages = state.language_service.list().await?;
    let default_locale = state.language_service.default_code().await?;
    let site = &state.config.site;

    Ok(Json(SiteInfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        name: site.name.clone(),
        base_url: site.base_url.clone(),
        contact_email: site.contact_email.clone(),
        languages,
        default_locale,
        captcha_enabled: state.forms_service.captcha_enabled(),
    }))
}

/// GET /api/site/legal-notice
async fn get_legal_notice(State(state): State<AppState>) -> Json<LegalNoticeResponse> {
    let site = &state.config.site;
    Json(LegalNoticeResponse {
        site_name: site.name.clone(),
        contact_email: site.contact_email.clone(),
        notice: site.legal.clone(),
    })
}

/// GET /api/home?locale=
async fn get_home(
    State(state): State<AppState>,
    Query(query): Query<LocaleQuery>,
) -> Result<Json<HomeResponse>, ApiError> {
    let locale = state
        .language_service
        .resolve_locale(query.locale.as_deref())
        .await?;
    let cache_key = format!("home:{}", locale);
    if let Ok(Some(cached)) = state.cache.get::<HomeResponse>(&cache_key).await {
        return Ok(Json(cached));
    }

    let home = HomeResponse {
        featured_projects: state.project_service.featured(&locale, HOME_PROJECTS).await?,
        latest_blogs: state.blog_service.latest(&locale, HOME_BLOGS).await?,
        testimonials: state.review_service.testimonials(None, HOME_TESTIMONIALS).await?,
        locale,
    };
    let ttl = Duration::from_secs(state.config.cache.ttl_seconds);
    if let Err(e) = state.cache.set(&cache_key, &home, ttl).await {
        tracing::warn!("Failed to cache {}: {}", cache_key, e);
    }
    Ok(Json(home))
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.pool.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse { status: "ok", database: "ok" }),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse { status: "degraded", database: "unreachable" }),
            )
        }
    }
}

/// GET /sitemap.xml
pub async fn sitemap(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let xml = match state.cache.get::<String>(SITEMAP_CACHE_KEY).await {
        Ok(Some(xml)) => xml,
        _ => {
            let languages = state.language_service.list().await?;
            let blogs = state.blog_service.all_published().await?;
            let projects = state.project_service.all_published().await?;
            let xml = build_sitemap(&state.config.site.base_url, &languages, &blogs, &projects);
            let ttl = Duration::from_secs(state.config.cache.ttl_seconds);
            if let Err(e) = state.cache.set(SITEMAP_CACHE_KEY, &xml, ttl).await {
                tracing::warn!("Failed to cache {}: {}", SITEMAP_CACHE_KEY, e);
            }
            xml
        }
    };
    Ok(([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], xml))
}
