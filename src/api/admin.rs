//! Admin API endpoints
//!
//! - GET /api/admin/stats - Dashboard counters
//! - GET/POST /api/admin/users - Back-office accounts (admin role)
//! - DELETE /api/admin/users/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateUserInput, PublishStatus, ReviewCounts, User};

/// Response for dashboard stats
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub blogs: ContentCounts,
    pub projects: ContentCounts,
    pub clients: i64,
    pub reviews: ReviewCounts,
}

#[derive(Debug, Serialize)]
pub struct ContentCounts {
    pub total: i64,
    pub published: i64,
    pub draft: i64,
}

pub fn stats_router() -> Router<AppState> {
    Router::new().route("/", get(stats))
}

/// Requires the admin role
pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", delete(delete_user))
}

/// GET /api/admin/stats
async fn stats(State(state): State<AppState>) -> Result<Json<DashboardResponse>, ApiError> {
    let blogs_published = state.blog_service.count(Some(PublishStatus::Published)).await?;
    let blogs_total = state.blog_service.count(None).await?;
    let projects_published = state.project_service.count(Some(PublishStatus::Published)).await?;
    let projects_total = state.project_service.count(None).await?;

    Ok(Json(DashboardResponse {
        blogs: ContentCounts {
            total: blogs_total,
            published: blogs_published,
            draft: blogs_total - blogs_published,
        },
        projects: ContentCounts {
            total: projects_total,
            published: projects_published,
            draft: projects_total - projects_published,
        },
        clients: state.client_service.count().await?,
        reviews: state.review_service.counts().await?,
    }))
}

/// GET /api/admin/users
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.user_service.list_users().await?))
}

/// POST /api/admin/users
async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.user_service.create_user(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// DELETE /api/admin/users/{id} - An admin cannot delete themself
async fn delete_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete_user(user.0.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
