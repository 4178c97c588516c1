//! Password reset codes.
//!
//! Only a SHA-256 digest of each code is stored. A code is valid until it
//! expires, is consumed, or has been guessed at too many times.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use harvest_market_core::{PasswordResetId, UserId};

use super::RepositoryError;

/// An outstanding reset code.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordReset {
    pub id: PasswordResetId,
    pub user_id: UserId,
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
}

/// Repository for password reset codes.
pub struct PasswordResetRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PasswordResetRepository<'a> {
    /// Create a new password reset repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new code, invalidating any earlier unused ones for the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE market.password_reset SET consumed_at = NOW() \
             WHERE user_id = $1 AND consumed_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO market.password_reset (user_id, code_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(code_hash)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Spend one guess on the user's newest live code.
    ///
    /// The attempt counter is incremented in the same statement that checks
    /// it, so concurrent guesses cannot exceed `max_attempts` between them.
    /// Returns `None` when there is no unconsumed, unexpired code or it has
    /// no guesses left. The returned row's `attempts` includes this guess.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn claim_attempt(
        &self,
        user_id: UserId,
        max_attempts: i32,
    ) -> Result<Option<PasswordReset>, RepositoryError> {
        let reset = sqlx::query_as::<_, PasswordReset>(
            r"
            UPDATE market.password_reset
            SET attempts = attempts + 1
            WHERE id = (
                SELECT id
                FROM market.password_reset
                WHERE user_id = $1 AND consumed_at IS NULL AND expires_at > NOW()
                ORDER BY created_at DESC
                LIMIT 1
            )
              AND attempts < $2
              AND consumed_at IS NULL
            RETURNING id, user_id, code_hash, attempts, expires_at
            ",
        )
        .bind(user_id)
        .bind(max_attempts)
        .fetch_optional(self.pool)
        .await?;
        Ok(reset)
    }

    /// Mark a code as used and set the new password hash atomically.
    ///
    /// Fails with `NotFound` if the code was consumed concurrently.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Database`.
    pub async fn consume_and_set_password(
        &self,
        reset: &PasswordReset,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            "UPDATE market.password_reset SET consumed_at = NOW() \
             WHERE id = $1 AND consumed_at IS NULL",
        )
        .bind(reset.id)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            r"
            INSERT INTO market.user_password (user_id, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
                SET password_hash = EXCLUDED.password_hash, updated_at = NOW()
            ",
        )
        .bind(reset.user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
