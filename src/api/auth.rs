//! Authentication API endpoints
//!
//! Handles HTTP requests for back-office authentication:
//! - GET /api/auth/has-admin - Whether the first account exists
//! - POST /api/auth/setup - Create the first admin
//! - POST /api/auth/login - User login
//! - POST /api/auth/logout - User logout
//! - GET /api/auth/me - Get current user
//! - PUT /api/auth/password - Change password

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, ClientIp, SessionToken};
use crate::models::User;
use crate::services::user::{ChangePasswordInput, LoginInput, SetupInput};
use crate::services::UserServiceError;

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Response for has-admin check
#[derive(Debug, Serialize)]
pub struct HasAdminResponse {
    pub has_admin: bool,
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/password", put(change_password))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/has-admin", get(has_admin))
        .route("/setup", post(setup))
        .route("/login", post(login))
}

fn session_cookie(token: &str, max_age: i64) -> Result<HeaderMap, ApiError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token, max_age
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal_error)?,
    );
    Ok(headers)
}

/// GET /api/auth/has-admin
async fn has_admin(State(state): State<AppState>) -> Result<Json<HasAdminResponse>, ApiError> {
    let has_admin = state.user_service.has_admin().await?;
    Ok(Json(HasAdminResponse { has_admin }))
}

/// POST /api/auth/setup - Create the first admin and log it in
async fn setup(
    State(state): State<AppState>,
    Json(body): Json<SetupInput>,
) -> Result<impl IntoResponse, ApiError> {
    let password = body.password.clone();
    let user = state.user_service.setup(body).await?;

    let (user, session) = state
        .user_service
        .login(LoginInput::new(&user.username, password))
        .await?;
    let headers = session_cookie(&session.id, state.user_service.session_max_age())?;

    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            user,
            token: session.id,
            expires_at: session.expires_at,
        }),
    ))
}

/// POST /api/auth/login
///
/// Throttled per IP (10 requests / minute) and per username
/// (5 failures / 15 minutes).
async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(ip) = ip {
        if state.rate_limiter.check_ip(ip).await {
            tracing::warn!(%ip, "login rate limit exceeded");
            return Err(ApiError::too_many_requests("Too many requests, please try again later", 60));
        }
    }

    let username = body.username_or_email.trim().to_string();
    if state.rate_limiter.is_username_limited(&username).await {
        tracing::warn!(username = %username, "too many failed logins");
        return Err(ApiError::too_many_requests(
            "Too many failed attempts, please try again in 15 minutes",
            900,
        ));
    }

    let (user, session) = match state
        .user_service
        .login(LoginInput::new(&username, body.password))
        .await
    {
        Ok(ok) => ok,
        Err(e) => {
            if matches!(e, UserServiceError::AuthenticationError(_)) {
                state.rate_limiter.record_failed_attempt(&username).await;
                tracing::info!(username = %username, "failed login");
            }
            return Err(e.into());
        }
    };

    state.rate_limiter.clear_username_attempts(&username).await;
    let headers = session_cookie(&session.id, state.user_service.session_max_age())?;

    Ok((
        headers,
        Json(AuthResponse {
            user,
            token: session.id,
            expires_at: session.expires_at,
        }),
    ))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.logout(&token).await?;

    // Clear the session cookie
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<User> {
    Json(user.0)
}

/// PUT /api/auth/password - Other sessions are revoked
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    SessionToken(token): SessionToken,
    Json(body): Json<ChangePasswordInput>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .change_password(&user.0, &token, body)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
