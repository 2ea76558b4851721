//! Project review model
//!
//! A review row is created together with its invitation link. The client
//! fills it in once through the tokenized link before `expires_at`; the
//! agency then decides whether to publish it as a testimonial.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client review of a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectReview {
    pub id: i64,
    pub project_id: i64,
    pub client_id: i64,
    /// Secret link token (base64url, 32 random bytes)
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    /// 1..=5 once submitted
    pub rating: Option<i32>,
    pub content: Option<String>,
    pub author_name: Option<String>,
    pub author_role: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Joined from projects for listings
    #[serde(default)]
    pub project_title: Option<String>,
    /// Joined from clients for listings
    #[serde(default)]
    pub client_name: Option<String>,
}

impl ProjectReview {
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Lifecycle state as of `now`
    pub fn state_at(&self, now: DateTime<Utc>) -> ReviewState {
        if self.is_submitted() {
            ReviewState::Submitted
        } else if self.is_expired_at(now) {
            ReviewState::Expired
        } else {
            ReviewState::Pending
        }
    }
}

/// Review lifecycle, derived from `submitted_at` and `expires_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    /// Link sent, waiting for the client
    Pending,
    Submitted,
    /// Link expired without a submission
    Expired,
}

/// Request for a new review link
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewLinkInput {
    pub project_id: i64,
    pub client_id: i64,
    /// Defaults to the configured link lifetime
    #[serde(default)]
    pub ttl_days: Option<i64>,
    #[serde(default)]
    pub send_email: bool,
}

/// Options for issuing a fresh token on an open review
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegenerateLinkInput {
    #[serde(default)]
    pub ttl_days: Option<i64>,
    #[serde(default)]
    pub send_email: bool,
}

/// Admin view of a review with its derived state and public link
#[derive(Debug, Clone, Serialize)]
pub struct ReviewRow {
    #[serde(flatten)]
    pub review: ProjectReview,
    pub state: ReviewState,
    pub link: String,
}

/// Created or regenerated link
#[derive(Debug, Clone, Serialize)]
pub struct ReviewLink {
    pub review: ProjectReview,
    /// Absolute URL of the public review form
    pub link: String,
    pub email_sent: bool,
}

/// What the public review form needs to render
#[derive(Debug, Clone, Serialize)]
pub struct ReviewInvitation {
    pub project_title: String,
    pub client_name: String,
    pub expires_at: DateTime<Utc>,
}

/// Payload posted by the client through the review link
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSubmission {
    pub rating: i32,
    pub content: String,
    pub author_name: String,
    #[serde(default)]
    pub author_role: Option<String>,
}

/// Admin edit of a review
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReviewInput {
    pub rating: Option<i32>,
    pub content: Option<String>,
    pub author_name: Option<String>,
    pub author_role: Option<String>,
    pub published: Option<bool>,
}

/// Admin grid filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewFilter {
    pub status: Option<ReviewState>,
    pub project_id: Option<i64>,
    pub client_id: Option<i64>,
}

/// Published review as shown on the public site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: i64,
    pub project_id: i64,
    pub project_title: String,
    pub rating: i32,
    pub content: String,
    pub author_name: String,
    pub author_role: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Review counts for the dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReviewCounts {
    pub pending: i64,
    pub submitted: i64,
    pub expired: i64,
    pub published: i64,
}
