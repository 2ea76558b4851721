//! Services layer - Business logic
//!
//! This module contains all business logic services for Vitrine.
//! Services are responsible for:
//! - Implementing business rules and validation
//! - Coordinating between repositories and cache
//! - Talking to the outside world (SMTP, reCAPTCHA)

pub mod blog;
pub mod captcha;
pub mod category;
pub mod client;
pub mod forms;
pub mod language;
pub mod mail;
pub mod markdown;
pub mod password;
pub mod project;
pub mod rate_limiter;
pub mod review;
pub mod sitemap;
pub mod slug;
pub mod user;
pub mod validation;

pub use blog::{BlogService, BlogServiceError};
pub use captcha::{create_verifier, CaptchaOutcome, CaptchaVerifier};
pub use category::{CategoryService, CategoryServiceError};
pub use client::{ClientService, ClientServiceError};
pub use forms::{FormsService, FormsServiceError};
pub use language::{LanguageService, LanguageServiceError};
pub use mail::{create_mailer, MailService, Mailer};
pub use markdown::MarkdownRenderer;
pub use password::{hash_password, verify_password};
pub use project::{ProjectService, ProjectServiceError};
pub use rate_limiter::RateLimiter;
pub use review::{ReviewService, ReviewServiceError};
pub use slug::generate_slug;
pub use user::{ChangePasswordInput, LoginInput, SetupInput, UserService, UserServiceError};
