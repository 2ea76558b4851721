//! User service
//!
//! Back-office accounts and sessions:
//! - first-run setup of the initial admin
//! - login/logout with opaque session tokens
//! - password changes (other sessions are revoked)
//! - admin management of additional accounts

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use crate::services::validation::is_valid_email;
use anyhow::Context;
use chrono::Duration;
use serde::Deserialize;
use std::sync::Arc;

/// Default session lifetime in days
const DEFAULT_SESSION_DAYS: i64 = 7;

/// Minimum password length for every account
pub const MIN_PASSWORD_LEN: usize = 8;

const MAX_USERNAME_LEN: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials. The message never tells which part was wrong.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    /// Setup was called although an account already exists
    #[error("Setup has already been completed")]
    SetupCompleted,

    #[error("User not found: {0}")]
    NotFound(i64),

    #[error("You cannot delete your own account")]
    CannotDeleteSelf,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Login payload; `username` also accepts an email address
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// First-run setup payload
#[derive(Debug, Clone, Deserialize)]
pub struct SetupInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_days(user_repo, session_repo, DEFAULT_SESSION_DAYS)
    }

    pub fn with_session_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days,
        }
    }

    /// Session lifetime in seconds, for the cookie `Max-Age`
    pub fn session_max_age(&self) -> i64 {
        self.session_days * 24 * 60 * 60
    }

    /// Whether any account exists. The login screen uses this to offer setup.
    pub async fn has_admin(&self) -> Result<bool, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        Ok(count > 0)
    }

    /// Create the first admin account. Refused once any account exists.
    pub async fn setup(&self, input: SetupInput) -> Result<User, UserServiceError> {
        if self.has_admin().await? {
            return Err(UserServiceError::SetupCompleted);
        }
        let user = self
            .create_user(CreateUserInput {
                username: input.username,
                email: input.email,
                password: input.password,
                role: UserRole::Admin,
            })
            .await?;
        tracing::info!(user_id = user.id, username = %user.username, "initial admin created");
        Ok(user)
    }

    /// Create an account with the given role
    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();
        validate_account(&username, &email, &input.password)?;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }
        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let password_hash = hash_password(&input.password)?;
        let user = User::new(username, email, password_hash, input.role);
        let created = self.user_repo.create(&user).await.context("Failed to create user")?;
        tracing::info!(user_id = created.id, role = %created.role, "user created");
        Ok(created)
    }

    /// Check credentials and open a session.
    ///
    /// Unknown user and wrong password produce the same error.
    pub async fn login(&self, input: LoginInput) -> Result<(User, Session), UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .find_by_username_or_email(input.username.trim())
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(invalid());
        }

        let session = Session::new(user.id, Duration::days(self.session_days));
        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        tracing::info!(user_id = user.id, "user logged in");
        Ok((user, session))
    }

    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Expired sessions are deleted on sight and yield `None`.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    /// Change the password of `user`, keeping only the session `current_token`.
    pub async fn change_password(
        &self,
        user: &User,
        current_token: &str,
        input: ChangePasswordInput,
    ) -> Result<(), UserServiceError> {
        if !verify_password(&input.current_password, &user.password_hash)? {
            return Err(UserServiceError::ValidationError(
                "Current password is incorrect".to_string(),
            ));
        }
        validate_password(&input.new_password)?;

        let hash = hash_password(&input.new_password)?;
        self.user_repo
            .update_password(user.id, &hash)
            .await
            .context("Failed to update password")?;
        let revoked = self
            .session_repo
            .delete_by_user_except(user.id, current_token)
            .await
            .context("Failed to revoke sessions")?;
        tracing::info!(user_id = user.id, revoked, "password changed");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.user_repo.list().await.context("Failed to list users")?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user")?)
    }

    /// Delete an account. `acting_user_id` may not delete itself.
    pub async fn delete_user(&self, acting_user_id: i64, id: i64) -> Result<(), UserServiceError> {
        if acting_user_id == id {
            return Err(UserServiceError::CannotDeleteSelf);
        }
        if self.get_by_id(id).await?.is_none() {
            return Err(UserServiceError::NotFound(id));
        }
        self.user_repo.delete(id).await.context("Failed to delete user")?;
        tracing::info!(user_id = id, by = acting_user_id, "user deleted");
        Ok(())
    }

    /// Remove expired sessions, returns how many were deleted
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    async fn find_by_username_or_email(&self, login: &str) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(login)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }
        if !login.contains('@') {
            return Ok(None);
        }
        Ok(self
            .user_repo
            .get_by_email(login)
            .await
            .context("Failed to get user by email")?)
    }
}

fn validate_password(password: &str) -> Result<(), UserServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn validate_account(username: &str, email: &str, password: &str) -> Result<(), UserServiceError> {
    if username.is_empty() {
        return Err(UserServiceError::ValidationError("Username cannot be empty".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LEN
        || !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(UserServiceError::ValidationError(
            "Username may only contain letters, digits, '.', '_' and '-'".to_string(),
        ));
    }
    if !is_valid_email(email) {
        return Err(UserServiceError::ValidationError("Invalid email format".to_string()));
    }
    validate_password(password)
}
