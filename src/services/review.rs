//! Client review service
//!
//! A review starts as a pending row holding a secret token. The client opens
//! `{base_url}{link_path}/{token}` and submits once before the expiry; the
//! agency then edits and publishes it as a testimonial.

use crate::config::{ReviewConfig, SiteConfig};
use crate::db::query::{BindValue, SqlFilter};
use crate::db::repositories::{ClientRepository, ProjectRepository, ReviewRepository};
use crate::models::{
    Client, CreateReviewLinkInput, GridQuery, PagedResult, ProjectReview, RegenerateLinkInput,
    ReviewCounts, ReviewFilter, ReviewInvitation, ReviewLink, ReviewRow, ReviewState,
    ReviewSubmission, Testimonial, UpdateReviewInput, ADMIN_PER_PAGE,
};
use crate::services::mail::MailService;
use crate::services::project::ProjectService;
use crate::services::validation::{char_len, normalize_optional};
use anyhow::Context;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE64URL_NOPAD;
use std::sync::Arc;
use tera::Context as TeraContext;

const SORTABLE: &[(&str, &str)] = &[
    ("created_at", "r.created_at"),
    ("expires_at", "r.expires_at"),
    ("submitted_at", "r.submitted_at"),
    ("rating", "r.rating"),
    ("project", "p.title"),
    ("client", "c.name"),
];

const SEARCHABLE: &[&str] = &["r.author_name", "r.content", "p.title", "c.name"];

const TOKEN_BYTES: usize = 32;
pub const MAX_TTL_DAYS: i64 = 365;
pub const MIN_CONTENT_LEN: usize = 10;
pub const MAX_CONTENT_LEN: usize = 2000;
const MAX_NAME_LEN: usize = 120;
const MAX_TESTIMONIALS: i64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum ReviewServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Review not found: {0}")]
    NotFound(String),

    #[error("This review has already been submitted")]
    AlreadySubmitted,

    #[error("This review link has expired")]
    LinkExpired,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Random link token: 32 bytes, base64url without padding
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    BASE64URL_NOPAD.encode(&bytes)
}

pub struct ReviewService {
    repo: Arc<dyn ReviewRepository>,
    project_repo: Arc<dyn ProjectRepository>,
    client_repo: Arc<dyn ClientRepository>,
    projects: Arc<ProjectService>,
    mail: Arc<MailService>,
    link_base: String,
    default_ttl_days: i64,
}

impl ReviewService {
    pub fn new(
        repo: Arc<dyn ReviewRepository>,
        project_repo: Arc<dyn ProjectRepository>,
        client_repo: Arc<dyn ClientRepository>,
        projects: Arc<ProjectService>,
        mail: Arc<MailService>,
        site: &SiteConfig,
        config: &ReviewConfig,
    ) -> Self {
        let path = config.link_path.trim_end_matches('/');
        let path = if path.starts_with('/') || path.is_empty() {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        Self {
            repo,
            project_repo,
            client_repo,
            projects,
            mail,
            link_base: format!("{}{}", site.base_url.trim_end_matches('/'), path),
            default_ttl_days: config.link_ttl_days,
        }
    }

    /// Public URL of the review form for `token`
    pub fn link_for(&self, token: &str) -> String {
        format!("{}/{}", self.link_base, token)
    }

    pub async fn create_link(&self, input: CreateReviewLinkInput) -> Result<ReviewLink, ReviewServiceError> {
        let expires_at = self.expiry(input.ttl_days)?;

        let project = self
            .project_repo
            .get_by_id(input.project_id)
            .await
            .context("Failed to get project")?
            .ok_or_else(|| ReviewServiceError::ValidationError(format!("Project {} does not exist", input.project_id)))?;
        let client = self
            .client_repo
            .get_by_id(input.client_id)
            .await
            .context("Failed to get client")?
            .ok_or_else(|| ReviewServiceError::ValidationError(format!("Client {} does not exist", input.client_id)))?;

        let token = generate_token();
        let review = self
            .repo
            .create(project.id, client.id, &token, expires_at)
            .await
            .context("Failed to create review link")?;
        let link = self.link_for(&token);
        tracing::info!(id = review.id, project_id = project.id, client_id = client.id, "review link created");

        let email_sent = if input.send_email {
            self.send_invitation(&client, &project.title, &link, expires_at).await
        } else {
            false
        };

        Ok(ReviewLink { review, link, email_sent })
    }

    /// What the public form shows for an open link
    pub async fn get_by_token(&self, token: &str) -> Result<ReviewInvitation, ReviewServiceError> {
        let review = self.open_review(token, Utc::now()).await?;
        Ok(ReviewInvitation {
            project_title: review.project_title.unwrap_or_default(),
            client_name: review.client_name.unwrap_or_default(),
            expires_at: review.expires_at,
        })
    }

    /// Record the client's review. A token can be used exactly once.
    pub async fn submit(&self, token: &str, submission: ReviewSubmission) -> Result<ProjectReview, ReviewServiceError> {
        let token = token.trim();
        let now = Utc::now();
        self.open_review(token, now).await?;
        let submission = validate_submission(submission)?;

        let accepted = self
            .repo
            .submit(token, &submission, now)
            .await
            .context("Failed to submit review")?;
        if !accepted {
            // Lost a race with another submit, or expired in between
            return match self.open_review(token, Utc::now()).await {
                Ok(_) => Err(ReviewServiceError::AlreadySubmitted),
                Err(e) => Err(e),
            };
        }

        let review = self
            .repo
            .get_by_token(token)
            .await
            .context("Failed to reload review")?
            .ok_or_else(|| ReviewServiceError::NotFound(token.to_string()))?;
        tracing::info!(id = review.id, project_id = review.project_id, rating = ?review.rating, "review submitted");

        let mut context = TeraContext::new();
        context.insert("review", &review);
        if let Err(e) = self.mail.notify_agency("review_submitted.txt", &context, None).await {
            tracing::warn!(id = review.id, "Failed to notify agency of new review: {:#}", e);
        }

        Ok(review)
    }

    pub async fn admin_list(
        &self,
        query: &GridQuery,
        filter: &ReviewFilter,
    ) -> Result<PagedResult<ReviewRow>, ReviewServiceError> {
        let now = Utc::now();
        let params = query.params(ADMIN_PER_PAGE);
        let mut sql = SqlFilter::new();
        if let Some(status) = filter.status {
            push_status(&mut sql, status, now);
        }
        sql.eq_opt("r.project_id", filter.project_id)
            .eq_opt("r.client_id", filter.client_id)
            .search(SEARCHABLE, query.search_term());
        let order_by = query.order_by(SORTABLE, "r.created_at", "r.id");

        let (items, total) = self
            .repo
            .list(&sql, &order_by, &params)
            .await
            .context("Failed to list reviews")?;
        Ok(PagedResult::new(items, total, &params).map(|review| self.row(review, now)))
    }

    pub async fn get(&self, id: i64) -> Result<ReviewRow, ReviewServiceError> {
        let review = self.find(id).await?;
        Ok(self.row(review, Utc::now()))
    }

    /// Partial admin edit. Only submitted reviews can be published.
    pub async fn update(&self, id: i64, input: UpdateReviewInput) -> Result<ReviewRow, ReviewServiceError> {
        let mut review = self.find(id).await?;

        if let Some(rating) = input.rating {
            validate_rating(rating)?;
            review.rating = Some(rating);
        }
        if let Some(content) = input.content {
            review.content = Some(validate_content(&content)?);
        }
        if let Some(author_name) = input.author_name {
            review.author_name = Some(validate_author_name(&author_name)?);
        }
        if input.author_role.is_some() {
            review.author_role = normalize_optional(input.author_role);
        }
        if let Some(published) = input.published {
            if published && !review.is_submitted() {
                return Err(ReviewServiceError::ValidationError(
                    "Only submitted reviews can be published".to_string(),
                ));
            }
            review.published = published;
        }

        let updated = self.repo.update(&review).await.context("Failed to update review")?;
        self.projects.invalidate().await;
        tracing::info!(id, published = updated.published, "review updated");
        Ok(self.row(updated, Utc::now()))
    }

    /// New token and expiry for a review that has not been submitted
    pub async fn regenerate(&self, id: i64, input: RegenerateLinkInput) -> Result<ReviewLink, ReviewServiceError> {
        let review = self.find(id).await?;
        if review.is_submitted() {
            return Err(ReviewServiceError::AlreadySubmitted);
        }
        let expires_at = self.expiry(input.ttl_days)?;

        let token = generate_token();
        let replaced = self
            .repo
            .regenerate(id, &token, expires_at)
            .await
            .context("Failed to regenerate review link")?;
        if !replaced {
            return Err(ReviewServiceError::AlreadySubmitted);
        }

        let review = self.find(id).await?;
        let link = self.link_for(&token);
        tracing::info!(id, "review link regenerated");

        let email_sent = if input.send_email {
            match self.client_repo.get_by_id(review.client_id).await.context("Failed to get client")? {
                Some(client) => {
                    let title = review.project_title.clone().unwrap_or_default();
                    self.send_invitation(&client, &title, &link, expires_at).await
                }
                None => false,
            }
        } else {
            false
        };

        Ok(ReviewLink { review, link, email_sent })
    }

    pub async fn delete(&self, id: i64) -> Result<(), ReviewServiceError> {
        let review = self.find(id).await?;
        self.repo.delete(id).await.context("Failed to delete review")?;
        if review.published {
            self.projects.invalidate().await;
        }
        tracing::info!(id, "review deleted");
        Ok(())
    }

    /// Published testimonials, newest first
    pub async fn testimonials(&self, project_id: Option<i64>, limit: i64) -> Result<Vec<Testimonial>, ReviewServiceError> {
        let limit = limit.clamp(1, MAX_TESTIMONIALS);
        Ok(self
            .repo
            .list_testimonials(project_id, limit)
            .await
            .context("Failed to list testimonials")?)
    }

    pub async fn counts(&self) -> Result<ReviewCounts, ReviewServiceError> {
        let now = Utc::now();
        let mut counts = ReviewCounts::default();
        for status in [ReviewState::Pending, ReviewState::Submitted, ReviewState::Expired] {
            let mut sql = SqlFilter::new();
            push_status(&mut sql, status, now);
            let count = self.repo.count(&sql).await.context("Failed to count reviews")?;
            match status {
                ReviewState::Pending => counts.pending = count,
                ReviewState::Submitted => counts.submitted = count,
                ReviewState::Expired => counts.expired = count,
            }
        }
        let mut sql = SqlFilter::new();
        sql.eq("r.published", true);
        counts.published = self.repo.count(&sql).await.context("Failed to count reviews")?;
        Ok(counts)
    }

    async fn find(&self, id: i64) -> Result<ProjectReview, ReviewServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get review")?
            .ok_or_else(|| ReviewServiceError::NotFound(id.to_string()))
    }

    /// Review behind `token` if it can still be submitted at `now`
    async fn open_review(&self, token: &str, now: DateTime<Utc>) -> Result<ProjectReview, ReviewServiceError> {
        let review = self
            .repo
            .get_by_token(token.trim())
            .await
            .context("Failed to get review")?
            .ok_or_else(|| ReviewServiceError::NotFound("unknown review link".to_string()))?;
        match review.state_at(now) {
            ReviewState::Pending => Ok(review),
            ReviewState::Submitted => Err(ReviewServiceError::AlreadySubmitted),
            ReviewState::Expired => Err(ReviewServiceError::LinkExpired),
        }
    }

    fn expiry(&self, ttl_days: Option<i64>) -> Result<DateTime<Utc>, ReviewServiceError> {
        let days = ttl_days.unwrap_or(self.default_ttl_days);
        if !(1..=MAX_TTL_DAYS).contains(&days) {
            return Err(ReviewServiceError::ValidationError(format!(
                "Link lifetime must be between 1 and {} days",
                MAX_TTL_DAYS
            )));
        }
        Ok(Utc::now() + Duration::days(days))
    }

    fn row(&self, review: ProjectReview, now: DateTime<Utc>) -> ReviewRow {
        ReviewRow {
            state: review.state_at(now),
            link: self.link_for(&review.token),
            review,
        }
    }

    /// Mail the link to the client. Failures are logged, never returned.
    async fn send_invitation(&self, client: &Client, project_title: &str, link: &str, expires_at: DateTime<Utc>) -> bool {
        let email = match client.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) => email,
            None => {
                tracing::warn!(client_id = client.id, "Client has no email, invitation not sent");
                return false;
            }
        };

        let mut context = TeraContext::new();
        context.insert("client_name", &client.name);
        context.insert("project_title", project_title);
        context.insert("link", link);
        context.insert("expires_at", &expires_at.format("%Y-%m-%d").to_string());

        match self.mail.send_template(email, "review_invitation.txt", &context, None).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(client_id = client.id, "Failed to send review invitation: {:#}", e);
                false
            }
        }
    }
}

fn push_status(sql: &mut SqlFilter, status: ReviewState, now: DateTime<Utc>) {
    match status {
        ReviewState::Pending => sql.push("r.submitted_at IS NULL AND r.expires_at >= ?", [BindValue::Time(now)]),
        ReviewState::Submitted => sql.push("r.submitted_at IS NOT NULL", Vec::<BindValue>::new()),
        ReviewState::Expired => sql.push("r.submitted_at IS NULL AND r.expires_at < ?", [BindValue::Time(now)]),
    };
}

fn validate_rating(rating: i32) -> Result<(), ReviewServiceError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(ReviewServiceError::ValidationError("Rating must be between 1 and 5".to_string()))
    }
}

fn validate_content(content: &str) -> Result<String, ReviewServiceError> {
    let content = content.trim();
    let len = char_len(content);
    if !(MIN_CONTENT_LEN..=MAX_CONTENT_LEN).contains(&len) {
        return Err(ReviewServiceError::ValidationError(format!(
            "Review must be between {} and {} characters",
            MIN_CONTENT_LEN, MAX_CONTENT_LEN
        )));
    }
    Ok(content.to_string())
}

fn validate_author_name(name: &str) -> Result<String, ReviewServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ReviewServiceError::ValidationError("Name is required".to_string()));
    }
    if char_len(name) > MAX_NAME_LEN {
        return Err(ReviewServiceError::ValidationError(format!(
            "Name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn validate_submission(submission: ReviewSubmission) -> Result<ReviewSubmission, ReviewServiceError> {
    validate_rating(submission.rating)?;
    Ok(ReviewSubmission {
        rating: submission.rating,
        content: validate_content(&submission.content)?,
        author_name: validate_author_name(&submission.author_name)?,
        author_role: normalize_optional(submission.author_role),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::MailConfig;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxClientRepository, SqlxLanguageRepository,
        SqlxProjectRepository, SqlxReviewRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{ClientInput, ProjectInput, PublishStatus};
    use crate::services::client::ClientService;
    use crate::services::language::LanguageService;
    use crate::services::mail::MemoryMailer;

    struct Fixture {
        pool: DynDatabasePool,
        service: ReviewService,
        projects: Arc<ProjectService>,
        mailer: Arc<MemoryMailer>,
        project_id: i64,
        client_id: i64,
    }

    async fn setup(client_email: Option<&str>) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let languages = Arc::new(LanguageService::new(
            SqlxLanguageRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
        ));
        let projects = Arc::new(ProjectService::new(
            SqlxProjectRepository::boxed(pool.clone()),
            SqlxClientRepository::boxed(pool.clone()),
            SqlxCategoryRepository::boxed(pool.clone()),
            SqlxReviewRepository::boxed(pool.clone()),
            languages,
            Arc::new(MemoryCache::new()),
            std::time::Duration::from_secs(60),
        ));
        let client = ClientService::new(SqlxClientRepository::boxed(pool.clone()), Arc::new(MemoryCache::new()))
            .create(ClientInput {
                name: "Claire Durand".to_string(),
                email: client_email.map(str::to_string),
                ..Default::default()
            })
            .await
            .unwrap();
        let project = projects
            .create(ProjectInput {
                title: "Boutique Durand".to_string(),
                locale: "fr".to_string(),
                content: "Une boutique en ligne.".to_string(),
                status: PublishStatus::Published,
                client_id: Some(client.id),
                ..Default::default()
            })
            .await
            .unwrap();

        let mailer = Arc::new(MemoryMailer::new());
        let mail_config = MailConfig {
            notify_to: "agency@example.com".to_string(),
            ..Default::default()
        };
        let site = SiteConfig {
            base_url: "https://agency.example/".to_string(),
            ..Default::default()
        };
        let mail = Arc::new(MailService::new(mailer.clone(), &mail_config, &site).unwrap());
        let service = ReviewService::new(
            SqlxReviewRepository::boxed(pool.clone()),
            SqlxProjectRepository::boxed(pool.clone()),
            SqlxClientRepository::boxed(pool.clone()),
            projects.clone(),
            mail,
            &site,
            &ReviewConfig::default(),
        );

        Fixture {
            pool,
            service,
            projects,
            mailer,
            project_id: project.id,
            client_id: client.id,
        }
    }

    fn link_input(f: &Fixture, send_email: bool) -> CreateReviewLinkInput {
        CreateReviewLinkInput {
            project_id: f.project_id,
            client_id: f.client_id,
            ttl_days: None,
            send_email,
        }
    }

    fn submission() -> ReviewSubmission {
        ReviewSubmission {
            rating: 5,
            content: "  Travail soigné et livré à temps.  ".to_string(),
            author_name: "Claire".to_string(),
            author_role: Some("Gérante".to_string()),
        }
    }

    async fn expire(pool: &DynDatabasePool, id: i64) {
        pool.execute(&format!(
            "UPDATE project_reviews SET expires_at = '2000-01-01T00:00:00+00:00' WHERE id = {}",
            id
        ))
        .await
        .unwrap();
    }

    #[test]
    fn test_generate_token() {
        let token = generate_token();
        assert_eq!(token.len(), 43);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, generate_token());
    }

    #[tokio::test]
    async fn test_create_link() {
        let f = setup(Some("claire@example.com")).await;
        let link = f.service.create_link(link_input(&f, true)).await.unwrap();

        assert_eq!(link.link, format!("https://agency.example/review/{}", link.review.token));
        assert!(link.email_sent);
        let days = (link.review.expires_at - Utc::now()).num_days();
        assert!((29..=30).contains(&days));

        let sent = f.mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "claire@example.com");
        assert!(sent[0].body.contains(&link.link));
    }

    #[tokio::test]
    async fn test_create_link_validation() {
        let f = setup(None).await;
        let bad_ttl = CreateReviewLinkInput { ttl_days: Some(0), ..link_input(&f, false) };
        assert!(matches!(f.service.create_link(bad_ttl).await, Err(ReviewServiceError::ValidationError(_))));
        let bad_ttl = CreateReviewLinkInput { ttl_days: Some(366), ..link_input(&f, false) };
        assert!(matches!(f.service.create_link(bad_ttl).await, Err(ReviewServiceError::ValidationError(_))));
        let bad_project = CreateReviewLinkInput { project_id: 999, ..link_input(&f, false) };
        assert!(matches!(f.service.create_link(bad_project).await, Err(ReviewServiceError::ValidationError(_))));

        // No email on file: link is created, mail is skipped
        let link = f.service.create_link(link_input(&f, true)).await.unwrap();
        assert!(!link.email_sent);
    }

    #[tokio::test]
    async fn test_mail_failure_is_not_an_error() {
        let f = setup(Some("claire@example.com")).await;
        f.mailer.set_failing(true);
        let link = f.service.create_link(link_input(&f, true)).await.unwrap();
        assert!(!link.email_sent);
    }

    #[tokio::test]
    async fn test_token_is_single_use() {
        let f = setup(None).await;
        let link = f.service.create_link(link_input(&f, false)).await.unwrap();
        let token = link.review.token.clone();

        let invitation = f.service.get_by_token(&token).await.unwrap();
        assert_eq!(invitation.project_title, "Boutique Durand");
        assert_eq!(invitation.client_name, "Claire Durand");

        let review = f.service.submit(&token, submission()).await.unwrap();
        assert_eq!(review.rating, Some(5));
        assert_eq!(review.content.as_deref(), Some("Travail soigné et livré à temps."));
        assert!(review.submitted_at.is_some());
        assert!(!review.published);

        assert!(matches!(f.service.get_by_token(&token).await, Err(ReviewServiceError::AlreadySubmitted)));
        assert!(matches!(
            f.service.submit(&token, submission()).await,
            Err(ReviewServiceError::AlreadySubmitted)
        ));

        // Agency notification
        let sent = f.mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "agency@example.com");
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let f = setup(None).await;
        let token = f.service.create_link(link_input(&f, false)).await.unwrap().review.token;

        let cases = [
            ReviewSubmission { rating: 0, ..submission() },
            ReviewSubmission { rating: 6, ..submission() },
            ReviewSubmission { content: "Trop court".chars().take(9).collect(), ..submission() },
            ReviewSubmission { content: "x".repeat(MAX_CONTENT_LEN + 1), ..submission() },
            ReviewSubmission { author_name: "   ".to_string(), ..submission() },
        ];
        for case in cases {
            assert!(matches!(
                f.service.submit(&token, case).await,
                Err(ReviewServiceError::ValidationError(_))
            ));
        }

        // Still open after rejected attempts
        f.service.get_by_token(&token).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_and_expired_tokens() {
        let f = setup(None).await;
        assert!(matches!(f.service.get_by_token("nope").await, Err(ReviewServiceError::NotFound(_))));

        let link = f.service.create_link(link_input(&f, false)).await.unwrap();
        expire(&f.pool, link.review.id).await;
        assert!(matches!(
            f.service.get_by_token(&link.review.token).await,
            Err(ReviewServiceError::LinkExpired)
        ));
        assert!(matches!(
            f.service.submit(&link.review.token, submission()).await,
            Err(ReviewServiceError::LinkExpired)
        ));
    }

    #[tokio::test]
    async fn test_regenerate_resets_expiry() {
        let f = setup(None).await;
        let link = f.service.create_link(link_input(&f, false)).await.unwrap();
        expire(&f.pool, link.review.id).await;

        let fresh = f
            .service
            .regenerate(link.review.id, RegenerateLinkInput { ttl_days: Some(7), send_email: false })
            .await
            .unwrap();
        assert_ne!(fresh.review.token, link.review.token);
        assert!(fresh.review.expires_at > Utc::now() + Duration::days(6));
        assert!(matches!(
            f.service.get_by_token(&link.review.token).await,
            Err(ReviewServiceError::NotFound(_))
        ));

        f.service.submit(&fresh.review.token, submission()).await.unwrap();
        assert!(matches!(
            f.service.regenerate(link.review.id, RegenerateLinkInput::default()).await,
            Err(ReviewServiceError::AlreadySubmitted)
        ));
    }

    #[tokio::test]
    async fn test_publish_requires_submission() {
        let f = setup(None).await;
        let link = f.service.create_link(link_input(&f, false)).await.unwrap();
        let id = link.review.id;

        let publish = UpdateReviewInput { published: Some(true), ..Default::default() };
        assert!(matches!(
            f.service.update(id, publish.clone()).await,
            Err(ReviewServiceError::ValidationError(_))
        ));

        f.service.submit(&link.review.token, submission()).await.unwrap();
        let row = f.service.update(id, publish).await.unwrap();
        assert!(row.review.published);
        assert_eq!(row.state, ReviewState::Submitted);

        let testimonials = f.service.testimonials(Some(f.project_id), 6).await.unwrap();
        assert_eq!(testimonials.len(), 1);
        assert_eq!(testimonials[0].author_name, "Claire");

        let detail = f.projects.get_published("fr", "boutique-durand").await.unwrap();
        assert_eq!(detail.reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_status_filter_and_counts() {
        let f = setup(None).await;
        let submitted = f.service.create_link(link_input(&f, false)).await.unwrap();
        f.service.submit(&submitted.review.token, submission()).await.unwrap();
        let expired = f.service.create_link(link_input(&f, false)).await.unwrap();
        expire(&f.pool, expired.review.id).await;
        f.service.create_link(link_input(&f, false)).await.unwrap();

        let filter = ReviewFilter { status: Some(ReviewState::Expired), ..Default::default() };
        let page = f.service.admin_list(&GridQuery::default(), &filter).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].review.id, expired.review.id);
        assert_eq!(page.items[0].state, ReviewState::Expired);

        let counts = f.service.counts().await.unwrap();
        assert_eq!(
            counts,
            ReviewCounts { pending: 1, submitted: 1, expired: 1, published: 0 }
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let f = setup(None).await;
        let link = f.service.create_link(link_input(&f, false)).await.unwrap();
        f.service.delete(link.review.id).await.unwrap();
        assert!(matches!(f.service.get(link.review.id).await, Err(ReviewServiceError::NotFound(_))));
        assert!(matches!(f.service.delete(link.review.id).await, Err(ReviewServiceError::NotFound(_))));
    }
}
