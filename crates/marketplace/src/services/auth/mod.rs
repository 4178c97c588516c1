//! Authentication service.
//!
//! Password registration and login with Argon2id hashes, password changes,
//! and email-delivered reset codes.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use harvest_market_core::{Email, UserId, UserRole};

use crate::db::users::NewUser;
use crate::db::{PasswordResetRepository, RepositoryError, UserRepository};
use crate::models::User;
use crate::services::email::{EmailService, generate_code};
use crate::validation;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Argon2 input is bounded to keep hashing cost predictable.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Reset codes stay valid this long.
pub const RESET_CODE_TTL_MINUTES: i64 = 15;

/// Guesses allowed per reset code, the successful one included.
pub const MAX_RESET_ATTEMPTS: i32 = 5;

const MAX_NAME_LENGTH: usize = 100;
const MAX_PHONE_LENGTH: usize = 32;

/// Fields accepted at self-registration.
#[derive(Debug)]
pub struct Registration<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub phone: Option<&'a str>,
    pub role: UserRole,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    resets: PasswordResetRepository<'a>,
    email: Option<&'a EmailService>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    ///
    /// Without an email service, reset codes and welcome mails are skipped.
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: Option<&'a EmailService>) -> Self {
        Self {
            users: UserRepository::new(pool),
            resets: PasswordResetRepository::new(pool),
            email,
        }
    }

    /// Register a buyer or seller account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a bad name, phone or an `admin` role,
    /// `AuthError::WeakPassword` for a short password and
    /// `AuthError::UserAlreadyExists` if the email is taken.
    pub async fn register(&self, input: &Registration<'_>) -> Result<User, AuthError> {
        let email = Email::parse(input.email)?;
        let name = validation::required_text("name", input.name, MAX_NAME_LENGTH)?;
        let phone = validation::optional_text("phone", input.phone, MAX_PHONE_LENGTH)?;

        if !input.role.is_self_assignable() {
            return Err(validation::ValidationError(
                "role must be buyer or seller".to_string(),
            )
            .into());
        }

        validate_password(input.password)?;
        let password_hash = hash_password(input.password)?;

        let new = NewUser {
            name: &name,
            email: &email,
            phone: phone.as_deref(),
            role: input.role,
        };

        let user = self
            .users
            .create_with_password(&new, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        if let Some(mailer) = self.email.cloned() {
            let to = user.email.as_str().to_owned();
            let name = user.name.clone();
            let is_seller = user.role == UserRole::Seller;
            tokio::spawn(async move {
                if let Err(e) = mailer.send_welcome(&to, &name, is_seller).await {
                    tracing::warn!(error = %e, "Failed to send welcome email");
                }
            });
        }

        Ok(user)
    }

    /// Check an email and password.
    ///
    /// The blocked check runs after the password check so that a wrong
    /// password never reveals the account state.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` on any mismatch and
    /// `AuthError::Blocked` for a blocked account.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_with_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.is_active() {
            return Err(AuthError::Blocked);
        }

        Ok(user)
    }

    /// Change a signed-in user's password after re-checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong and
    /// `AuthError::WeakPassword` if `new` is too short.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let hash = self
            .users
            .password_hash(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(current, &hash)?;
        validate_password(new)?;

        let new_hash = hash_password(new)?;
        self.users.set_password(user_id, &new_hash).await?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Issue a reset code for `email` and mail it.
    ///
    /// Succeeds whether or not the account exists. The code itself is never
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed address or
    /// `AuthError::Repository` if the code cannot be stored.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;

        let Some(user) = self.users.get_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        if !user.is_active() {
            tracing::info!(user_id = %user.id, "Password reset requested for blocked account");
            return Ok(());
        }

        let code = generate_code();
        let expires_at = Utc::now() + Duration::minutes(RESET_CODE_TTL_MINUTES);
        self.resets
            .create(user.id, &hash_reset_code(&code), expires_at)
            .await?;

        match self.email.cloned() {
            Some(mailer) => {
                let to = user.email.as_str().to_owned();
                let name = user.name.clone();
                let user_id = user.id;
                tokio::spawn(async move {
                    if let Err(e) = mailer
                        .send_password_reset(&to, &name, &code, RESET_CODE_TTL_MINUTES)
                        .await
                    {
                        tracing::error!(user_id = %user_id, error = %e, "Failed to send reset code");
                    }
                });
            }
            None => {
                tracing::warn!(
                    user_id = %user.id,
                    "Email is not configured; password reset code was not delivered"
                );
            }
        }

        Ok(())
    }

    /// Set a new password using a previously emailed code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetCode` if the code is wrong, expired,
    /// already used or out of attempts, and `AuthError::WeakPassword` for a
    /// short password.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;
        let email = Email::parse(email)?;

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidResetCode)?;

        let reset = self
            .resets
            .claim_attempt(user.id, MAX_RESET_ATTEMPTS)
            .await?
            .ok_or(AuthError::InvalidResetCode)?;

        if hash_reset_code(code.trim()) != reset.code_hash {
            tracing::info!(user_id = %user.id, attempts = reset.attempts, "Wrong reset code");
            return Err(AuthError::InvalidResetCode);
        }

        let password_hash = hash_password(new_password)?;
        self.resets
            .consume_and_set_password(&reset, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::InvalidResetCode,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }

    /// Create an admin account or promote an existing one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` or `AuthError::Repository`.
    pub async fn create_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let name = validation::required_text("name", name, MAX_NAME_LENGTH)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self.users.upsert_admin(&name, &email, &password_hash).await?;
        Ok(user)
    }
}

/// Validate password strength.
fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// SHA-256 hex digest of a reset code, as stored in `market.password_reset`.
#[must_use]
pub fn hash_reset_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("exactly8").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hash_reset_code_is_stable_hex() {
        let a = hash_reset_code("123456");
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_reset_code("123456"));
        assert_ne!(a, hash_reset_code("654321"));
    }
}
