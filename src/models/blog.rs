//! Blog model
//!
//! This module provides:
//! - `Blog` entity, one row per (slug, locale)
//! - `PublishStatus`, shared with projects
//! - `BlogInput` payload and `BlogFilter` grid filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Blog post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    pub id: i64,
    /// URL-friendly slug, unique within a locale
    pub slug: String,
    /// Language code
    pub locale: String,
    pub title: String,
    pub excerpt: Option<String>,
    /// Markdown source
    pub content: String,
    /// Rendered HTML
    pub content_html: String,
    pub cover_image: Option<String>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub status: PublishStatus,
    /// Set the first time the post is published
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Publication status of blogs and projects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    #[default]
    Draft,
    Published,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Draft => "draft",
            PublishStatus::Published => "published",
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PublishStatus::Draft),
            "published" => Ok(PublishStatus::Published),
            _ => Err(anyhow::anyhow!("Invalid publication status: {}", s)),
        }
    }
}

/// Create/update payload (full replacement)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogInput {
    pub title: String,
    /// Generated from the title when omitted
    #[serde(default)]
    pub slug: Option<String>,
    pub locale: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub status: PublishStatus,
}

/// Admin grid filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogFilter {
    pub locale: Option<String>,
    pub status: Option<PublishStatus>,
    pub category_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        assert_eq!("Published".parse::<PublishStatus>().unwrap(), PublishStatus::Published);
        assert_eq!(PublishStatus::Draft.to_string(), "draft");
        assert!("archived".parse::<PublishStatus>().is_err());
    }
}
