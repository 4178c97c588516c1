//! Notification repository.
//!
//! Other repositories create notifications inside their own transactions via
//! [`insert_in`], so a follow, like or booking update and its notification
//! commit together.

use sqlx::{PgConnection, PgPool};

use harvest_market_core::{NotificationId, NotificationKind, Page, PageRequest, UserId};

use super::RepositoryError;
use crate::models::Notification;

/// Contents of a notification to deliver.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

impl NewNotification {
    #[must_use]
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            link: None,
        }
    }

    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Insert a notification on an existing connection or transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_in(
    conn: &mut PgConnection,
    notification: &NewNotification,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO market.notification (user_id, kind, title, body, link) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(notification.user_id)
    .bind(notification.kind)
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(notification.link.as_deref())
    .execute(conn)
    .await?;
    Ok(())
}

/// Repository for a user's notifications.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Deliver a notification outside any other write.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, notification: &NewNotification) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_in(&mut conn, notification).await
    }

    /// List a user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let items = sqlx::query_as::<_, Notification>(
            r"
            SELECT id, user_id, kind, title, body, link, read_at, created_at
            FROM market.notification
            WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *tx)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM market.notification \
             WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// Number of unread notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM market.notification WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Mark one notification read. Already-read notifications keep their
    /// original timestamp.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification does not belong
    /// to `user_id`.
    pub async fn mark_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<Notification, RepositoryError> {
        sqlx::query_as::<_, Notification>(
            r"
            UPDATE market.notification
            SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, kind, title, body, link, read_at, created_at
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Mark every unread notification read; returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE market.notification SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification does not belong
    /// to `user_id`.
    pub async fn delete(&self, user_id: UserId, id: NotificationId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM market.notification WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
