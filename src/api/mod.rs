//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP endpoints of Vitrine:
//! - Public site data (site info, home, legal notice, sitemap)
//! - Public blog, project and testimonial listings
//! - Review links and public forms
//! - Authentication
//! - Back-office CRUD under `/api/admin`

pub mod admin;
pub mod auth;
pub mod blogs;
pub mod categories;
pub mod clients;
pub mod forms;
pub mod languages;
pub mod middleware;
pub mod projects;
pub mod reviews;
pub mod site;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // User management (need admin role)
    let user_routes = Router::new()
        .nest("/admin/users", admin::users_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Back-office content (any authenticated user)
    let admin_routes = Router::new()
        .nest("/admin/stats", admin::stats_router())
        .nest("/admin/blogs", blogs::admin_router())
        .nest("/admin/projects", projects::admin_router())
        .nest("/admin/clients", clients::admin_router())
        .nest("/admin/categories", categories::admin_router())
        .nest("/admin/languages", languages::admin_router())
        .nest("/admin/reviews", reviews::admin_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .merge(site::router())
        .merge(forms::router())
        .nest("/blogs", blogs::public_router())
        .nest("/projects", projects::public_router())
        .nest("/reviews", reviews::public_router())
        .nest("/categories", categories::public_router())
        .nest("/languages", languages::public_router())
        .nest("/auth", auth::public_router())
        .merge(user_routes)
        .merge(admin_routes)
        .merge(protected_routes)
}

async fn not_found() -> ApiError {
    ApiError::not_found("No such endpoint")
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    // Credentials are allowed so the session cookie works cross-origin
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match state.config.server.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!(
            origin = %state.config.server.cors_origin,
            "Invalid CORS origin, cross-origin requests will be rejected"
        ),
    }

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .route("/sitemap.xml", get(site::sitemap))
        .fallback(not_found)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
