//! Category model
//!
//! Categories are shared by blogs and projects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(slug: String, name: String, description: Option<String>) -> Self {
        Self {
            id: 0,
            slug,
            name,
            description,
            created_at: Utc::now(),
        }
    }
}

/// Create/update payload. A missing slug is generated from the name.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
