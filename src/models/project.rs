//! Project (portfolio) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PublishStatus, Testimonial};

/// Portfolio project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    /// URL-friendly slug, unique within a locale
    pub slug: String,
    pub locale: String,
    pub title: String,
    pub summary: Option<String>,
    /// Markdown source
    pub content: String,
    pub content_html: String,
    pub cover_image: Option<String>,
    /// Live site of the delivered project
    pub url: Option<String>,
    pub client_id: Option<i64>,
    pub category_id: Option<i64>,
    pub status: PublishStatus,
    /// Featured projects are listed first and shown on the home page
    pub featured: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload (full replacement)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub locale: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub sort_order: i32,
}

/// Admin grid filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub locale: Option<String>,
    pub status: Option<PublishStatus>,
    pub client_id: Option<i64>,
    pub category_id: Option<i64>,
    pub featured: Option<bool>,
}

/// Public project page: the project, its client and published reviews
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub client_name: Option<String>,
    pub reviews: Vec<Testimonial>,
}
