//! Language model
//!
//! Every blog and project is written in one language, referenced by its
//! `code` (the locale). Exactly one language is the default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Language {
    pub id: i64,
    /// Locale code such as `fr` or `en-GB`
    pub code: String,
    /// Display name
    pub name: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLanguageInput {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

/// The code is immutable once created since content references it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLanguageInput {
    pub name: Option<String>,
    pub is_default: Option<bool>,
}
