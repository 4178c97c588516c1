//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::validation::ValidationError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] harvest_market_core::EmailError),

    /// Wrong password or unknown email.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but has been blocked by an admin.
    #[error("account is blocked")]
    Blocked,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or too long.
    #[error("{0}")]
    WeakPassword(String),

    /// Reset code wrong, expired, consumed or out of attempts.
    #[error("invalid or expired reset code")]
    InvalidResetCode,

    /// A profile field failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Session state missing or invalid.
    #[error("session expired, please log in again")]
    InvalidSessionState,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
