//! API middleware
//!
//! Contains:
//! - Application state shared by every handler
//! - The JSON error type and its mapping from service errors
//! - Authentication (session token validation) and authorization

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{create_cache, Cache};
use crate::config::Config;
use crate::db::repositories::{
    SqlxBlogRepository, SqlxCategoryRepository, SqlxClientRepository, SqlxLanguageRepository,
    SqlxProjectRepository, SqlxReviewRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{FieldError, User};
use crate::services::{
    BlogService, BlogServiceError, CaptchaVerifier, CategoryService, CategoryServiceError,
    ClientService, ClientServiceError, FormsService, FormsServiceError, LanguageService,
    LanguageServiceError, MailService, Mailer, ProjectService, ProjectServiceError, RateLimiter,
    ReviewService, ReviewServiceError, UserService, UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub cache: Arc<Cache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub user_service: Arc<UserService>,
    pub language_service: Arc<LanguageService>,
    pub category_service: Arc<CategoryService>,
    pub client_service: Arc<ClientService>,
    pub blog_service: Arc<BlogService>,
    pub project_service: Arc<ProjectService>,
    pub review_service: Arc<ReviewService>,
    pub forms_service: Arc<FormsService>,
}

impl AppState {
    /// Wire repositories and services on top of `pool`
    pub fn new(
        pool: DynDatabasePool,
        config: Config,
        mailer: Arc<dyn Mailer>,
        captcha: Arc<dyn CaptchaVerifier>,
    ) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache);
        let cache_ttl = Duration::from_secs(config.cache.ttl_seconds);

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let language_repo = SqlxLanguageRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let client_repo = SqlxClientRepository::boxed(pool.clone());
        let blog_repo = SqlxBlogRepository::boxed(pool.clone());
        let project_repo = SqlxProjectRepository::boxed(pool.clone());
        let review_repo = SqlxReviewRepository::boxed(pool.clone());

        let mail_service = Arc::new(MailService::new(mailer, &config.mail, &config.site)?);
        let user_service = Arc::new(UserService::with_session_days(
            user_repo,
            session_repo,
            config.auth.session_days,
        ));
        let language_service = Arc::new(LanguageService::new(language_repo, cache.clone()));
        let category_service = Arc::new(CategoryService::new(category_repo.clone(), cache.clone()));
        let client_service = Arc::new(ClientService::new(client_repo.clone(), cache.clone()));
        let blog_service = Arc::new(BlogService::new(
            blog_repo,
            category_repo.clone(),
            language_service.clone(),
            cache.clone(),
            cache_ttl,
        ));
        let project_service = Arc::new(ProjectService::new(
            project_repo.clone(),
            client_repo.clone(),
            category_repo,
            review_repo.clone(),
            language_service.clone(),
            cache.clone(),
            cache_ttl,
        ));
        let review_service = Arc::new(ReviewService::new(
            review_repo,
            project_repo,
            client_repo,
            project_service.clone(),
            mail_service.clone(),
            &config.site,
            &config.review,
        ));
        let forms_service = Arc::new(FormsService::new(captcha, mail_service));

        Ok(Self {
            pool,
            config: Arc::new(config),
            cache,
            rate_limiter: Arc::new(RateLimiter::new()),
            user_service,
            language_service,
            category_service,
            client_service,
            blog_service,
            project_service,
            review_service,
            forms_service,
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Session token of the current request, inserted next to the user
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// 400 with per-field messages in `details.fields`
    pub fn invalid_fields(fields: Vec<FieldError>) -> Self {
        Self::with_details(
            "VALIDATION_ERROR",
            "Some fields are invalid",
            serde_json::json!({ "fields": fields }),
        )
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn too_many_requests(message: impl Into<String>, retry_after: u64) -> Self {
        Self::with_details(
            "TOO_MANY_REQUESTS",
            message,
            serde_json::json!({ "retry_after": retry_after }),
        )
    }

    /// Logs the cause and hides it from the client
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", cause);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" | "ALREADY_SUBMITTED" => StatusCode::CONFLICT,
            "GONE" | "LINK_EXPIRED" => StatusCode::GONE,
            "TOO_MANY_REQUESTS" => StatusCode::TOO_MANY_REQUESTS,
            "MAIL_ERROR" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(_) => {
                ApiError::unauthorized("Invalid username or password")
            }
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(_) => ApiError::conflict(e.to_string()),
            UserServiceError::SetupCompleted | UserServiceError::CannotDeleteSelf => {
                ApiError::forbidden(e.to_string())
            }
            UserServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            UserServiceError::InternalError(cause) => ApiError::internal_error(format!("{:#}", cause)),
        }
    }
}

impl From<LanguageServiceError> for ApiError {
    fn from(e: LanguageServiceError) -> Self {
        match e {
            LanguageServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            LanguageServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            LanguageServiceError::DuplicateCode(_)
            | LanguageServiceError::CannotDeleteDefault
            | LanguageServiceError::InUse(..) => ApiError::conflict(e.to_string()),
            LanguageServiceError::InternalError(cause) => ApiError::internal_error(format!("{:#}", cause)),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CategoryServiceError::DuplicateSlug(_) => ApiError::conflict(e.to_string()),
            CategoryServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            CategoryServiceError::InternalError(cause) => ApiError::internal_error(format!("{:#}", cause)),
        }
    }
}

impl From<ClientServiceError> for ApiError {
    fn from(e: ClientServiceError) -> Self {
        match e {
            ClientServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ClientServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            ClientServiceError::InternalError(cause) => ApiError::internal_error(format!("{:#}", cause)),
        }
    }
}

impl From<BlogServiceError> for ApiError {
    fn from(e: BlogServiceError) -> Self {
        match e {
            BlogServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            BlogServiceError::DuplicateSlug(_) => ApiError::conflict(e.to_string()),
            BlogServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            BlogServiceError::InternalError(cause) => ApiError::internal_error(format!("{:#}", cause)),
        }
    }
}

impl From<ProjectServiceError> for ApiError {
    fn from(e: ProjectServiceError) -> Self {
        match e {
            ProjectServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ProjectServiceError::DuplicateSlug(_) => ApiError::conflict(e.to_string()),
            ProjectServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            ProjectServiceError::InternalError(cause) => ApiError::internal_error(format!("{:#}", cause)),
        }
    }
}

impl From<ReviewServiceError> for ApiError {
    fn from(e: ReviewServiceError) -> Self {
        match e {
            ReviewServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ReviewServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            ReviewServiceError::AlreadySubmitted => ApiError::new("ALREADY_SUBMITTED", e.to_string()),
            ReviewServiceError::LinkExpired => ApiError::new("LINK_EXPIRED", e.to_string()),
            ReviewServiceError::InternalError(cause) => ApiError::internal_error(format!("{:#}", cause)),
        }
    }
}

impl From<FormsServiceError> for ApiError {
    fn from(e: FormsServiceError) -> Self {
        match e {
            FormsServiceError::Invalid(fields) => ApiError::invalid_fields(fields),
            FormsServiceError::MailError(_) => {
                ApiError::new("MAIL_ERROR", "Your message could not be sent, please try again later")
            }
            FormsServiceError::InternalError(cause) => ApiError::internal_error(format!("{:#}", cause)),
        }
    }
}

/// Extract session token from `Authorization: Bearer` or the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    request.extensions_mut().insert(SessionToken(token));
    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionToken>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Best-known client address.
///
/// Proxy headers are only honoured with `server.trusted_proxy`; otherwise
/// the socket peer is used.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(parts, state.config.server.trusted_proxy)))
    }
}

fn client_ip(parts: &Parts, trusted_proxy: bool) -> Option<IpAddr> {
    let from_headers = if trusted_proxy {
        forwarded_ip(&parts.headers)
    } else {
        None
    };
    let from_socket = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    from_headers.or(from_socket)
}

/// Client address from `X-Forwarded-For` (first hop) or `X-Real-IP`
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().and_then(|ip| ip.trim().parse().ok()) {
            return Some(ip);
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_token_from_bearer_and_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc"));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=xyz"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("xyz"));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert!(extract_session_token(&headers).is_none());
    }

    #[test]
    fn test_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(forwarded_ip(&headers), "203.0.113.9".parse().ok());

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("not an ip"));
        assert_eq!(forwarded_ip(&headers), None);
    }

    #[test]
    fn test_client_ip_ignores_headers_unless_trusted() {
        let (mut parts, _) = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.9")
            .body(())
            .unwrap()
            .into_parts();
        let peer: SocketAddr = "198.51.100.4:51000".parse().unwrap();
        parts.extensions.insert(ConnectInfo(peer));

        assert_eq!(client_ip(&parts, false), Some(peer.ip()));
        assert_eq!(client_ip(&parts, true), "203.0.113.9".parse().ok());

        parts.extensions.remove::<ConnectInfo<SocketAddr>>();
        assert_eq!(client_ip(&parts, false), None);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ApiError::from(ReviewServiceError::LinkExpired).status(), StatusCode::GONE);
        assert_eq!(ApiError::from(ReviewServiceError::AlreadySubmitted).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(FormsServiceError::MailError("smtp down".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ApiError::too_many_requests("slow down", 60).status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::from(LanguageServiceError::CannotDeleteDefault).status(),
            StatusCode::CONFLICT
        );
    }
}
