//! Client API endpoints (admin only)
//!
//! - GET/POST /api/admin/clients
//! - GET/PUT/DELETE /api/admin/clients/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{Client, ClientInput, GridQuery, PagedResult};

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_by_id).put(update).delete(delete))
}

async fn list(
    State(state): State<AppState>,
    Query(query): Query<GridQuery>,
) -> Result<Json<PagedResult<Client>>, ApiError> {
    Ok(Json(state.client_service.list(&query).await?))
}

async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Client>, ApiError> {
    Ok(Json(state.client_service.get_by_id(id).await?))
}

async fn create(
    State(state): State<AppState>,
    Json(input): Json<ClientInput>,
) -> Result<(StatusCode, Json<Client>), ApiError> {
    let client = state.client_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ClientInput>,
) -> Result<Json<Client>, ApiError> {
    Ok(Json(state.client_service.update(id, input).await?))
}

/// Projects keep existing without a client; its reviews are deleted
async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.client_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
