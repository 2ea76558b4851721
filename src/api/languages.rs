//! Language API endpoints
//!
//! - GET /api/languages - All languages (public)
//! - GET/POST /api/admin/languages
//! - GET/PUT/DELETE /api/admin/languages/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateLanguageInput, Language, UpdateLanguageInput};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_by_id).put(update).delete(delete))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<Language>>, ApiError> {
    Ok(Json(state.language_service.list().await?))
}

async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Language>, ApiError> {
    Ok(Json(state.language_service.get_by_id(id).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateLanguageInput>,
) -> Result<(StatusCode, Json<Language>), ApiError> {
    let language = state.language_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(language)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateLanguageInput>,
) -> Result<Json<Language>, ApiError> {
    Ok(Json(state.language_service.update(id, input).await?))
}

async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.language_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
