use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use vitrine::api::{build_router, AppState};
use vitrine::config::Config;
use vitrine::db::{create_test_pool, migrations};
use vitrine::services::captcha::StaticCaptcha;
use vitrine::services::mail::MemoryMailer;
use vitrine::services::CaptchaOutcome;

const BODY_LIMIT: usize = 1024 * 1024;

struct TestApp {
    app: Router,
    state: AppState,
    mailer: Arc<MemoryMailer>,
}

async fn spawn_app() -> TestApp {
    let pool = create_test_pool().await.expect("pool");
    migrations::run_migrations(&pool).await.expect("migrations");

    let mut config = Config::default();
    config.site.name = "Studio Nord".to_string();
    config.site.base_url = "https://studio-nord.test".to_string();
    config.site.contact_email = "hello@studio-nord.test".to_string();

    let mailer = Arc::new(MemoryMailer::new());
    let state = AppState::new(
        pool,
        config,
        mailer.clone(),
        Arc::new(StaticCaptcha(CaptchaOutcome::Passed)),
    )
    .expect("state");
    let app = build_router(state.clone());
    TestApp { app, state, mailer }
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn admin_token(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/setup",
        None,
        Some(json!({"username": "admin", "email": "admin@studio-nord.test", "password": "correct horse"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_database_ok() {
    let t = spawn_app().await;
    let (status, _) = send(&t.app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn site_info_lists_seeded_languages() {
    let t = spawn_app().await;
    let (status, body) = send(&t.app, "GET", "/api/site", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Studio Nord");
    assert_eq!(body["default_locale"], "fr");
    assert_eq!(body["languages"].as_array().unwrap().len(), 2);
    assert_eq!(body["captcha_enabled"], true);
}

#[tokio::test]
async fn unknown_route_returns_json_not_found() {
    let t = spawn_app().await;
    let (status, body) = send(&t.app, "GET", "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn setup_login_and_me() {
    let t = spawn_app().await;

    let (_, body) = send(&t.app, "GET", "/api/auth/has-admin", None, None).await;
    assert_eq!(body["has_admin"], false);

    let token = admin_token(&t.app).await;
    let (status, body) = send(&t.app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "admin");

    // Second setup is refused
    let (status, _) = send(
        &t.app,
        "POST",
        "/api/auth/setup",
        None,
        Some(json!({"username": "other", "email": "other@studio-nord.test", "password": "another one"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &t.app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username_or_email": "admin", "password": "wrong password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username_or_email": "admin@studio-nord.test", "password": "correct horse"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let second = body["token"].as_str().unwrap().to_string();

    let (status, _) = send(&t.app, "POST", "/api/auth/logout", Some(&second), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&t.app, "GET", "/api/auth/me", Some(&second), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_require_a_session() {
    let t = spawn_app().await;
    for uri in ["/api/admin/blogs", "/api/admin/stats", "/api/admin/users", "/api/admin/reviews"] {
        let (status, body) = send(&t.app, "GET", uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }
    let (status, _) = send(&t.app, "GET", "/api/admin/blogs", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn published_blog_is_public_and_in_sitemap() {
    let t = spawn_app().await;
    let token = admin_token(&t.app).await;

    let (status, blog) = send(
        &t.app,
        "POST",
        "/api/admin/blogs",
        Some(&token),
        Some(json!({
            "title": "Créer un site vitrine",
            "locale": "fr",
            "content": "# Bonjour\n\nUn premier article.",
            "status": "published"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(blog["slug"], "creer-un-site-vitrine");

    let (_, draft) = send(
        &t.app,
        "POST",
        "/api/admin/blogs",
        Some(&token),
        Some(json!({"title": "Brouillon", "locale": "fr", "content": "pas encore"})),
    )
    .await;

    let (status, body) = send(&t.app, "GET", "/api/blogs/fr/creer-un-site-vitrine", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["content_html"].as_str().unwrap().contains("<h1>"));

    let (status, _) = send(&t.app, "GET", "/api/blogs/fr/brouillon", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&t.app, "GET", "/api/blogs?locale=fr", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let resp = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/sitemap.xml").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/xml"));
    let xml = String::from_utf8(to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap().to_vec()).unwrap();
    assert!(xml.contains("https://studio-nord.test/fr/blog/creer-un-site-vitrine"));
    assert!(!xml.contains("brouillon"));

    let (status, _) = send(
        &t.app,
        "DELETE",
        &format!("/api/admin/blogs/{}", draft["id"]),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, stats) = send(&t.app, "GET", "/api/admin/stats", Some(&token), None).await;
    assert_eq!(stats["blogs"]["total"], 1);
    assert_eq!(stats["blogs"]["published"], 1);
}

#[tokio::test]
async fn review_link_flow() {
    let t = spawn_app().await;
    let token = admin_token(&t.app).await;

    let (status, client) = send(
        &t.app,
        "POST",
        "/api/admin/clients",
        Some(&token),
        Some(json!({"name": "Acme", "email": "contact@acme.test"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, project) = send(
        &t.app,
        "POST",
        "/api/admin/projects",
        Some(&token),
        Some(json!({
            "title": "Refonte Acme",
            "locale": "fr",
            "content": "Refonte complète",
            "client_id": client["id"],
            "status": "published"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, link) = send(
        &t.app,
        "POST",
        "/api/admin/reviews/links",
        Some(&token),
        Some(json!({"project_id": project["id"], "client_id": client["id"], "send_email": true})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(link["email_sent"], true);
    let review_token = link["review"]["token"].as_str().unwrap().to_string();
    assert_eq!(review_token.len(), 43);
    assert!(link["link"].as_str().unwrap().ends_with(&review_token));
    assert_eq!(t.mailer.sent().await[0].to, "contact@acme.test");

    let (status, _) = send(&t.app, "GET", "/api/reviews/token/unknown", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let uri = format!("/api/reviews/token/{}", review_token);
    let (status, invitation) = send(&t.app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invitation["project_title"], "Refonte Acme");
    assert_eq!(invitation["client_name"], "Acme");

    let submission = json!({
        "rating": 5,
        "content": "Une équipe réactive et à l'écoute.",
        "author_name": "Jeanne Martin",
        "author_role": "CEO"
    });
    let (status, body) = send(&t.app, "POST", &uri, None, Some(submission.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["submitted"], true);

    let (status, body) = send(&t.app, "POST", &uri, None, Some(submission)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_SUBMITTED");

    // Not public until published
    let (_, testimonials) = send(&t.app, "GET", "/api/reviews", None, None).await;
    assert!(testimonials.as_array().unwrap().is_empty());

    let review_uri = format!("/api/admin/reviews/{}", link["review"]["id"]);
    let (status, _) = send(&t.app, "PUT", &review_uri, Some(&token), Some(json!({"published": true}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, testimonials) = send(&t.app, "GET", "/api/reviews", None, None).await;
    assert_eq!(testimonials[0]["author_name"], "Jeanne Martin");

    let (status, _) = send(
        &t.app,
        "POST",
        &format!("{}/regenerate", review_uri),
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn expired_review_link_is_gone() {
    let t = spawn_app().await;
    let token = admin_token(&t.app).await;

    let (_, client) = send(&t.app, "POST", "/api/admin/clients", Some(&token), Some(json!({"name": "Globex"}))).await;
    let (_, project) = send(
        &t.app,
        "POST",
        "/api/admin/projects",
        Some(&token),
        Some(json!({"title": "Globex app", "locale": "en", "content": "Mobile app"})),
    )
    .await;
    let (status, link) = send(
        &t.app,
        "POST",
        "/api/admin/reviews/links",
        Some(&token),
        Some(json!({"project_id": project["id"], "client_id": client["id"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(link["email_sent"], false);

    t.state
        .pool
        .execute(&format!(
            "UPDATE project_reviews SET expires_at = '2000-01-01T00:00:00+00:00' WHERE id = {}",
            link["review"]["id"]
        ))
        .await
        .unwrap();

    let uri = format!("/api/reviews/token/{}", link["review"]["token"].as_str().unwrap());
    let (status, body) = send(&t.app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"]["code"], "LINK_EXPIRED");

    // A fresh token reopens the link
    let (status, fresh) = send(
        &t.app,
        "POST",
        &format!("/api/admin/reviews/{}/regenerate", link["review"]["id"]),
        Some(&token),
        Some(json!({"ttl_days": 7})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let uri = format!("/api/reviews/token/{}", fresh["review"]["token"].as_str().unwrap());
    let (status, _) = send(&t.app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn estimation_step_validation_reports_fields() {
    let t = spawn_app().await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/estimation/validate",
        None,
        Some(json!({"step": 1, "draft": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let fields = body["error"]["details"]["fields"].as_array().unwrap();
    assert_eq!(fields[0]["field"], "project_type");

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/estimation/validate",
        None,
        Some(json!({"step": 1, "draft": {"project_type": "showcase"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (status, options) = send(&t.app, "GET", "/api/estimation/options", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!options["budgets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn contact_form_mails_the_agency() {
    let t = spawn_app().await;
    let message = json!({
        "name": "Paul",
        "email": "paul@example.com",
        "message": "Bonjour, pouvez-vous me rappeler ?",
        "captcha_token": "token"
    });

    let (status, body) = send(&t.app, "POST", "/api/contact", None, Some(message.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sent"], true);
    let sent = t.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "hello@studio-nord.test");
    assert_eq!(sent[0].reply_to.as_deref(), Some("paul@example.com"));

    t.mailer.set_failing(true);
    let (status, body) = send(&t.app, "POST", "/api/contact", None, Some(message)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "MAIL_ERROR");
}

#[tokio::test]
async fn legal_notice_and_home() {
    let t = spawn_app().await;
    let (status, body) = send(&t.app, "GET", "/api/site/legal-notice", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["site_name"], "Studio Nord");

    let (status, body) = send(&t.app, "GET", "/api/home?locale=en", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["locale"], "en");
    assert!(body["featured_projects"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn home_and_sitemap_are_cached() {
    use vitrine::cache::CacheLayer;

    let t = spawn_app().await;
    let (status, _) = send(&t.app, "GET", "/api/home?locale=en", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let resp = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/sitemap.xml").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let home: Option<Value> = t.state.cache.get("home:en").await.unwrap();
    assert_eq!(home.unwrap()["locale"], "en");
    let sitemap: Option<String> = t.state.cache.get("sitemap").await.unwrap();
    assert!(sitemap.unwrap().contains("<urlset"));
}
