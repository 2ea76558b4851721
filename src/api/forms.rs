//! Public form endpoints
//!
//! - GET /api/estimation/options - Wizard choices
//! - POST /api/estimation/validate - Validate one wizard step
//! - POST /api/estimation - Submit the estimation request
//! - POST /api/contact - Submit the contact form
//!
//! Submissions share the per-IP limiter with login.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, ClientIp};
use crate::models::{ContactMessage, EstimationSubmission, ValidateStepRequest};
use crate::services::forms::{self, EstimationOptions};

#[derive(Debug, Serialize)]
pub struct SentResponse {
    pub sent: bool,
}

#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub step: u8,
    pub valid: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/estimation", post(submit_estimation))
        .route("/estimation/options", get(options))
        .route("/estimation/validate", post(validate_step))
        .route("/contact", post(submit_contact))
}

async fn options() -> Json<EstimationOptions> {
    Json(forms::options())
}

/// 200 when the step is valid, 400 with `details.fields` otherwise
async fn validate_step(
    State(state): State<AppState>,
    Json(body): Json<ValidateStepRequest>,
) -> Result<Json<StepResponse>, ApiError> {
    let errors = state.forms_service.validate_step(body.step, &body.draft);
    if !errors.is_empty() {
        return Err(ApiError::invalid_fields(errors));
    }
    Ok(Json(StepResponse { step: body.step, valid: true }))
}

async fn throttle(state: &AppState, ip: Option<std::net::IpAddr>) -> Result<(), ApiError> {
    if let Some(ip) = ip {
        if state.rate_limiter.check_ip(ip).await {
            tracing::warn!(%ip, "form rate limit exceeded");
            return Err(ApiError::too_many_requests("Too many requests, please try again later", 60));
        }
    }
    Ok(())
}

async fn submit_estimation(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<EstimationSubmission>,
) -> Result<Json<SentResponse>, ApiError> {
    throttle(&state, ip).await?;
    state
        .forms_service
        .submit_estimation(body.draft, body.captcha_token.as_deref(), ip)
        .await?;
    Ok(Json(SentResponse { sent: true }))
}

async fn submit_contact(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<ContactMessage>,
) -> Result<Json<SentResponse>, ApiError> {
    throttle(&state, ip).await?;
    state.forms_service.submit_contact(body, ip).await?;
    Ok(Json(SentResponse { sent: true }))
}
