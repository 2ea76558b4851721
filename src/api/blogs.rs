//! Blog API endpoints
//!
//! Public:
//! - GET /api/blogs - Published posts of a locale, newest first
//! - GET /api/blogs/{locale}/{slug} - Published post
//!
//! Admin:
//! - GET/POST /api/admin/blogs
//! - GET/PUT/DELETE /api/admin/blogs/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Blog, BlogFilter, BlogInput, GridQuery, PagedResult, PublicFilter};

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
) -> Result<Json<PagedResult<Blog>>, ApiError> {
    Ok(Json(state.blog_service.list_published(&query, &filter).await?))
}

async fn get_published(
    State(state): State<AppState>,
    Path((locale, slug)): Path<(String, String)>,
) -> Result<Json<Blog>, ApiError> {
    Ok(Json(state.blog_service.get_published(&locale, &slug).await?))
}

async fn admin_list(
    State(state): State<AppState>,
    Query(query): Query<GridQuery>,
    Query(filter): Query<BlogFilter>,
) -> Result<Json<PagedResult<Blog>>, ApiError> {
    Ok(Json(state.blog_service.admin_list(&query, &filter).await?))
}

async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Blog>, ApiError> {
    Ok(Json(state.blog_service.get_by_id(id).await?))
}

async fn create(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<BlogInput>,
) -> Result<(StatusCode, Json<Blog>), ApiError> {
    let blog = state.blog_service.create(input, Some(user.0.id)).await?;
    Ok((StatusCode::CREATED, Json(blog)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<BlogInput>,
) -> Result<Json<Blog>, ApiError> {
    Ok(Json(state.blog_service.update(id, input).await?))
}

async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.blog_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
