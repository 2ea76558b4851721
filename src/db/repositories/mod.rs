//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod blog;
pub mod category;
pub mod client;
pub mod language;
pub mod project;
pub mod review;
pub mod session;
pub mod user;

pub use blog::{BlogRepository, SqlxBlogRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use client::{ClientRepository, SqlxClientRepository};
pub use language::{LanguageRepository, SqlxLanguageRepository};
pub use project::{ProjectRepository, SqlxProjectRepository};
pub use review::{ReviewRepository, SqlxReviewRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
