//! Client model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agency customer. Projects and review links point at clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub id: i64,
    /// Contact name
    pub name: String,
    pub company: Option<String>,
    /// Address review invitations are sent to
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
    /// Internal notes, never exposed publicly
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload (full replacement)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientInput {
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}
