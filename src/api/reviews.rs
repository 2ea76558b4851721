//! Review API endpoints
//!
//! Public:
//! - GET /api/reviews - Published testimonials
//! - GET /api/reviews/token/{token} - Open review form
//! - POST /api/reviews/token/{token} - Submit the review (once)
//!
//! Admin:
//! - GET /api/admin/reviews - Grid with `status` filter
//! - POST /api/admin/reviews/links - Create a review link
//! - GET/PUT/DELETE /api/admin/reviews/{id}
//! - POST /api/admin/reviews/{id}/regenerate - New token and expiry

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, ClientIp};
use crate::models::{
    CreateReviewLinkInput, GridQuery, PagedResult, RegenerateLinkInput, ReviewFilter,
    ReviewInvitation, ReviewLink, ReviewRow, ReviewSubmission, Testimonial, UpdateReviewInput,
};

const DEFAULT_TESTIMONIALS: i64 = 6;

#[derive(Debug, Deserialize)]
pub struct TestimonialQuery {
    pub project_id: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SubmittedResponse {
    pub submitted: bool,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(testimonials))
        .route("/token/{token}", get(get_by_token).post(submit))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list))
        .route("/links", post(create_link))
        .route("/{id}", get(get_by_id).put(update).delete(delete))
        .route("/{id}/regenerate", post(regenerate))
}

async fn testimonials(
    State(state): State<AppState>,
    Query(query): Query<TestimonialQuery>,
) -> Result<Json<Vec<Testimonial>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_TESTIMONIALS);
    Ok(Json(state.review_service.testimonials(query.project_id, limit).await?))
}

async fn get_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ReviewInvitation>, ApiError> {
    Ok(Json(state.review_service.get_by_token(&token).await?))
}

async fn submit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(token): Path<String>,
    Json(submission): Json<ReviewSubmission>,
) -> Result<(StatusCode, Json<SubmittedResponse>), ApiError> {
    if let Some(ip) = ip {
        if state.rate_limiter.check_ip(ip).await {
            return Err(ApiError::too_many_requests("Too many requests, please try again later", 60));
        }
    }
    state.review_service.submit(&token, submission).await?;
    Ok((StatusCode::CREATED, Json(SubmittedResponse { submitted: true })))
}

async fn admin_list(
    State(state): State<AppState>,
    Query(query): Query<GridQuery>,
    Query(filter): Query<ReviewFilter>,
) -> Result<Json<PagedResult<ReviewRow>>, ApiError> {
    Ok(Json(state.review_service.admin_list(&query, &filter).await?))
}

async fn create_link(
    State(state): State<AppState>,
    Json(input): Json<CreateReviewLinkInput>,
) -> Result<(StatusCode, Json<ReviewLink>), ApiError> {
    let link = state.review_service.create_link(input).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ReviewRow>, ApiError> {
    Ok(Json(state.review_service.get(id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateReviewInput>,
) -> Result<Json<ReviewRow>, ApiError> {
    Ok(Json(state.review_service.update(id, input).await?))
}

async fn regenerate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<RegenerateLinkInput>,
) -> Result<Json<ReviewLink>, ApiError> {
    Ok(Json(state.review_service.regenerate(id, input).await?))
}

async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.review_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
