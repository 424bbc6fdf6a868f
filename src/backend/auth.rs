use async_trait::async_trait;

use crate::error::QueryError;

use super::types::{Credentials, Session, SignUp, User};

/// Account and session operations of the authentication provider.
///
/// Implementations return [`QueryError::Unauthenticated`] whenever the call
/// needs a session and none is active.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The signed-in user.
    async fn current_user(&self) -> Result<User, QueryError>;

    async fn create_account(&self, request: &SignUp) -> Result<User, QueryError>;

    /// Signs in with email and password.
    async fn create_session(&self, credentials: &Credentials) -> Result<Session, QueryError>;

    /// Signs out of the current session.
    async fn delete_session(&self) -> Result<(), QueryError>;

    /// Sends a password recovery link to `email` pointing at `redirect_url`.
    async fn create_recovery(&self, email: &str, redirect_url: &str) -> Result<(), QueryError>;

    async fn complete_recovery(
        &self,
        user_id: &str,
        secret: &str,
        password: &str,
    ) -> Result<(), QueryError>;

    /// Sends an email verification link for the signed-in user.
    async fn create_verification(&self, redirect_url: &str) -> Result<(), QueryError>;

    async fn complete_verification(&self, user_id: &str, secret: &str) -> Result<(), QueryError>;
}
