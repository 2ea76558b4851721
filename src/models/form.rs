//! Public form payloads: estimation wizard and contact form

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Accumulated answers of the estimation wizard.
///
/// The front-end posts the whole draft at every step; only the fields of
/// the current step are validated until the final submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimationDraft {
    // Step 1
    #[serde(default)]
    pub project_type: Option<String>,
    // Step 2
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub feature_details: Option<String>,
    // Step 3
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    // Step 4
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub consent: bool,
}

/// Step validation request
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateStepRequest {
    pub step: u8,
    #[serde(default)]
    pub draft: EstimationDraft,
}

/// Final wizard submission
#[derive(Debug, Clone, Deserialize)]
pub struct EstimationSubmission {
    #[serde(flatten)]
    pub draft: EstimationDraft,
    #[serde(default)]
    pub captcha_token: Option<String>,
}

/// Contact form submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactMessage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub captcha_token: Option<String>,
}

/// One invalid field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
