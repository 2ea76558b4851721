//! Data models
//!
//! This module contains the data structures used throughout Vitrine:
//! - Database entities (User, Session, Language, Category, Client, Blog,
//!   Project, ProjectReview)
//! - Input payloads and grid filters
//! - Pagination types shared by every listing

mod blog;
mod category;
mod client;
mod form;
mod grid;
mod language;
mod project;
mod review;
mod session;
mod user;

pub use blog::{Blog, BlogFilter, BlogInput, PublishStatus};
pub use category::{Category, CategoryInput};
pub use client::{Client, ClientInput};
pub use form::{
    ContactMessage, EstimationDraft, EstimationSubmission, FieldError, ValidateStepRequest,
};
pub use grid::{
    GridQuery, ListParams, PagedResult, PublicFilter, SortDirection, ADMIN_PER_PAGE, MAX_PER_PAGE,
    PUBLIC_PER_PAGE,
};
pub use language::{CreateLanguageInput, Language, UpdateLanguageInput};
pub use project::{Project, ProjectDetail, ProjectFilter, ProjectInput};
pub use review::{
    CreateReviewLinkInput, ProjectReview, RegenerateLinkInput, ReviewCounts, ReviewFilter,
    ReviewInvitation, ReviewLink, ReviewRow, ReviewState, ReviewSubmission, Testimonial,
    UpdateReviewInput,
};
pub use session::Session;
pub use user::{CreateUserInput, User, UserRole};
