//! Direct messages between two users.
//!
//! Each pair of users has at most one conversation, keyed by the ordered pair
//! `(user_low, user_high)`. Unread counts are stored per participant in
//! `market.conversation_participant`.

use sqlx::PgPool;

use harvest_market_core::{
    ConversationId, MessageId, NotificationKind, Page, PageRequest, ProductId, UserId,
};

use super::RepositoryError;
use super::notifications::{self, NewNotification};
use crate::models::chat::preview;
use crate::models::{ConversationSummary, Message};

/// `$1` is the viewing participant.
const SUMMARY_SELECT: &str = r"
    SELECT c.id, other.id AS counterpart_id, other.name AS counterpart_name,
           other.avatar_url AS counterpart_avatar_url, c.product_id,
           c.last_message_preview, c.last_message_at, me.unread_count, c.created_at
    FROM market.conversation c
    JOIN market.conversation_participant me
      ON me.conversation_id = c.id AND me.user_id = $1
    JOIN market.user other
      ON other.id = CASE WHEN c.user_low = $1 THEN c.user_high ELSE c.user_low END
";

/// Maximum messages returned per request.
pub const MAX_MESSAGES: i64 = 100;

/// Repository for conversations and messages.
pub struct ConversationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ConversationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The caller's conversations, most recently active first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<ConversationSummary>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{SUMMARY_SELECT} \
             ORDER BY COALESCE(c.last_message_at, c.created_at) DESC, c.id DESC \
             LIMIT $2 OFFSET $3"
        );
        let items = sqlx::query_as::<_, ConversationSummary>(&sql)
            .bind(user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM market.conversation_participant WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// One conversation as seen by `user_id`; `None` if they are not in it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Option<ConversationSummary>, RepositoryError> {
        let sql = format!("{SUMMARY_SELECT} WHERE c.id = $2");
        let summary = sqlx::query_as::<_, ConversationSummary>(&sql)
            .bind(user_id)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(summary)
    }

    /// Return the conversation between two users, creating it if needed.
    ///
    /// A product reference is recorded the first time one is given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidReference` for an unknown recipient or
    /// product.
    pub async fn find_or_create(
        &self,
        user_id: UserId,
        recipient_id: UserId,
        product_id: Option<ProductId>,
    ) -> Result<ConversationSummary, RepositoryError> {
        let (low, high) = if user_id.as_i32() < recipient_id.as_i32() {
            (user_id, recipient_id)
        } else {
            (recipient_id, user_id)
        };

        let mut tx = self.pool.begin().await?;

        let id: ConversationId = sqlx::query_scalar(
            r"
            INSERT INTO market.conversation AS c (user_low, user_high, product_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_low, user_high) DO UPDATE
                SET product_id = COALESCE(c.product_id, EXCLUDED.product_id)
            RETURNING id
            ",
        )
        .bind(low)
        .bind(high)
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "conversation conflict"))?;

        sqlx::query(
            "INSERT INTO market.conversation_participant (conversation_id, user_id) \
             VALUES ($1, $2), ($1, $3) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(low)
        .bind(high)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(id, user_id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Messages newest first, optionally before a message id, and reset the
    /// caller's unread count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if `user_id` is not a participant.
    pub async fn messages(
        &self,
        id: ConversationId,
        user_id: UserId,
        before: Option<MessageId>,
        limit: i64,
    ) -> Result<Vec<Message>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let reset = sqlx::query(
            "UPDATE market.conversation_participant SET unread_count = 0, last_read_at = NOW() \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if reset.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let messages = sqlx::query_as::<_, Message>(
            r"
            SELECT id, conversation_id, sender_id, body, created_at
            FROM market.message
            WHERE conversation_id = $1 AND ($2::int IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            ",
        )
        .bind(id)
        .bind(before)
        .bind(limit.clamp(1, MAX_MESSAGES))
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(messages)
    }

    /// Send a message: insert it, refresh the conversation preview, bump the
    /// recipient's unread count and notify them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the sender is not a participant.
    pub async fn send(
        &self,
        id: ConversationId,
        sender_id: UserId,
        sender_name: &str,
        body: &str,
    ) -> Result<Message, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let is_participant: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM market.conversation_participant \
             WHERE conversation_id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(sender_id)
        .fetch_one(&mut *tx)
        .await?;

        if !is_participant {
            return Err(RepositoryError::NotFound);
        }

        let message = sqlx::query_as::<_, Message>(
            r"
            INSERT INTO market.message (conversation_id, sender_id, body)
            VALUES ($1, $2, $3)
            RETURNING id, conversation_id, sender_id, body, created_at
            ",
        )
        .bind(id)
        .bind(sender_id)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE market.conversation SET last_message_preview = $2, last_message_at = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(preview(body))
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

        let recipients: Vec<UserId> = sqlx::query_scalar(
            r"
            UPDATE market.conversation_participant
            SET unread_count = unread_count + 1
            WHERE conversation_id = $1 AND user_id <> $2
            RETURNING user_id
            ",
        )
        .bind(id)
        .bind(sender_id)
        .fetch_all(&mut *tx)
        .await?;

        for recipient in recipients {
            let notification = NewNotification::new(
                recipient,
                NotificationKind::Message,
                format!("Message from {sender_name}"),
                preview(body),
            )
            .with_link(format!("/messages/{id}"));
            notifications::insert_in(&mut tx, &notification).await?;
        }

        tx.commit().await?;
        Ok(message)
    }

    /// Reset the caller's unread count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if `user_id` is not a participant.
    pub async fn mark_read(&self, id: ConversationId, user_id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE market.conversation_participant SET unread_count = 0, last_read_at = NOW() \
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Unread messages across all of the caller's conversations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_total(&self, user_id: UserId) -> Result<i64, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(unread_count), 0)::bigint \
             FROM market.conversation_participant WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(total)
    }
}
