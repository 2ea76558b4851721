//! Project (portfolio) API endpoints
//!
//! Public:
//! - GET /api/projects - Published projects, featured first
//! - GET /api/projects/{locale}/{slug} - Project with client and testimonials
//!
//! Admin:
//! - GET/POST /api/admin/projects
//! - GET/PUT/DELETE /api/admin/projects/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{
    GridQuery, PagedResult, Project, ProjectDetail, ProjectFilter, ProjectInput, PublicFilter,
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/{locale}/{slug}", get(get_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list).post(create))
        .route("/{id}", get(get_by_id).put(update).delete(delete))
}

async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<GridQuery>,
    Query(filter): Query<PublicFilter>,
) -> Result<Json<PagedResult<Project>>, ApiError> {
    Ok(Json(state.project_service.list_published(&query, &filter).await?))
}

async fn get_published(
    State(state): State<AppState>,
    Path((locale, slug)): Path<(String, String)>,
) -> Result<Json<ProjectDetail>, ApiError> {
    Ok(Json(state.project_service.get_published(&locale, &slug).await?))
}

async fn admin_list(
    State(state): State<AppState>,
    Query(query): Query<GridQuery>,
    Query(filter): Query<ProjectFilter>,
) -> Result<Json<PagedResult<Project>>, ApiError> {
    Ok(Json(state.project_service.admin_list(&query, &filter).await?))
}

async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.project_service.get_by_id(id).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<ProjectInput>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state.project_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ProjectInput>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.project_service.update(id, input).await?))
}

async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.project_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
