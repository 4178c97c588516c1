//! Community posts, comments and likes.
//!
//! `comment_count` and `like_count` move only when a row is actually inserted
//! or removed, inside the same transaction as that row.

use sqlx::{PgConnection, PgPool};

use harvest_market_core::{CommentId, CommunityId, NotificationKind, Page, PageRequest, PostId, UserId};

use super::RepositoryError;
use super::notifications::{self, NewNotification};
use crate::models::{Comment, Post};

/// `$1` is the viewer (nullable) used for `liked_by_me`.
const POST_SELECT: &str = r"
    SELECT p.id, p.community_id, c.name AS community_name,
           p.author_id, u.name AS author_name, u.avatar_url AS author_avatar_url,
           p.content, p.image_urls, p.like_count, p.comment_count,
           EXISTS(SELECT 1 FROM market.community_like l
                  WHERE l.post_id = p.id AND l.user_id = $1) AS liked_by_me,
           p.created_at, p.updated_at
    FROM market.community_post p
    JOIN market.community c ON c.id = p.community_id
    JOIN market.user u ON u.id = p.author_id
";

const COMMENT_SELECT: &str = r"
    SELECT cm.id, cm.post_id, cm.author_id, u.name AS author_name,
           u.avatar_url AS author_avatar_url, cm.content, cm.created_at
    FROM market.community_comment cm
    JOIN market.user u ON u.id = cm.author_id
";

/// Who is acting, for notification text.
#[derive(Debug, Clone, Copy)]
pub struct Actor<'a> {
    pub id: UserId,
    pub name: &'a str,
}

/// Repository for posts and their comments and likes.
pub struct PostRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PostRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Posts across all communities (or one), newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        community_id: Option<CommunityId>,
        viewer: Option<UserId>,
        page: PageRequest,
    ) -> Result<Page<Post>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{POST_SELECT} WHERE ($2::int IS NULL OR p.community_id = $2) \
             ORDER BY p.created_at DESC, p.id DESC LIMIT $3 OFFSET $4"
        );
        let items = sqlx::query_as::<_, Post>(&sql)
            .bind(viewer)
            .bind(community_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM market.community_post p \
             WHERE ($1::int IS NULL OR p.community_id = $1)",
        )
        .bind(community_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PostId, viewer: Option<UserId>) -> Result<Option<Post>, RepositoryError> {
        let sql = format!("{POST_SELECT} WHERE p.id = $2");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(viewer)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(post)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        community_id: CommunityId,
        author_id: UserId,
        content: &str,
        image_urls: &[String],
    ) -> Result<Post, RepositoryError> {
        let id: PostId = sqlx::query_scalar(
            "INSERT INTO market.community_post (community_id, author_id, content, image_urls) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(community_id)
        .bind(author_id)
        .bind(content)
        .bind(image_urls)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "post conflict"))?;

        self.get(id, Some(author_id))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post does not exist.
    pub async fn update(
        &self,
        id: PostId,
        viewer: UserId,
        content: &str,
        image_urls: &[String],
    ) -> Result<Post, RepositoryError> {
        let result = sqlx::query(
            "UPDATE market.community_post SET content = $2, image_urls = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(content)
        .bind(image_urls)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id, Some(viewer)).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a post with its comments and likes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post does not exist.
    pub async fn delete(&self, id: PostId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM market.community_post WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // -- Comments -----------------------------------------------------------

    /// Comments on a post, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_comments(
        &self,
        post_id: PostId,
        page: PageRequest,
    ) -> Result<Page<Comment>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{COMMENT_SELECT} WHERE cm.post_id = $1 \
             ORDER BY cm.created_at ASC, cm.id ASC LIMIT $2 OFFSET $3"
        );
        let items = sqlx::query_as::<_, Comment>(&sql)
            .bind(post_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM market.community_comment WHERE post_id = $1")
                .bind(post_id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, RepositoryError> {
        let sql = format!("{COMMENT_SELECT} WHERE cm.id = $1");
        let comment = sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(comment)
    }

    /// Add a comment, bump the counter and tell the post author.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_comment(
        &self,
        post: &Post,
        actor: Actor<'_>,
        content: &str,
    ) -> Result<Comment, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: CommentId = sqlx::query_scalar(
            "INSERT INTO market.community_comment (post_id, author_id, content) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(post.id)
        .bind(actor.id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "comment conflict"))?;

        adjust_counter(&mut tx, post.id, "comment_count", 1).await?;

        if post.author_id != actor.id {
            let notification = NewNotification::new(
                post.author_id,
                NotificationKind::Comment,
                "New comment",
                format!("{} commented on your post", actor.name),
            )
            .with_link(format!("/posts/{}", post.id));
            notifications::insert_in(&mut tx, &notification).await?;
        }

        let sql = format!("{COMMENT_SELECT} WHERE cm.id = $1");
        let comment = sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(comment)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the comment does not exist.
    pub async fn delete_comment(&self, comment: &Comment) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM market.community_comment WHERE id = $1")
            .bind(comment.id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        adjust_counter(&mut tx, comment.post_id, "comment_count", -1).await?;

        tx.commit().await?;
        Ok(())
    }

    // -- Likes --------------------------------------------------------------

    /// Like a post. Returns the like count afterwards.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn like(&self, post: &Post, actor: Actor<'_>) -> Result<i32, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO market.community_like (post_id, user_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(post.id)
        .bind(actor.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let delta = i32::from(inserted == 1);
        let count = adjust_counter(&mut tx, post.id, "like_count", delta).await?;

        if inserted == 1 && post.author_id != actor.id {
            let notification = NewNotification::new(
                post.author_id,
                NotificationKind::Like,
                "New like",
                format!("{} liked your post", actor.name),
            )
            .with_link(format!("/posts/{}", post.id));
            notifications::insert_in(&mut tx, &notification).await?;
        }

        tx.commit().await?;
        Ok(count)
    }

    /// Remove a like. Returns the like count afterwards.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unlike(&self, post_id: PostId, user_id: UserId) -> Result<i32, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM market.community_like WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let count = adjust_counter(&mut tx, post_id, "like_count", -i32::from(removed == 1)).await?;

        tx.commit().await?;
        Ok(count)
    }
}

/// Add `delta` to one of the post counters, never going below zero.
async fn adjust_counter(
    conn: &mut PgConnection,
    post_id: PostId,
    column: &'static str,
    delta: i32,
) -> Result<i32, RepositoryError> {
    let sql = format!(
        "UPDATE market.community_post SET {column} = GREATEST({column} + $2, 0) \
         WHERE id = $1 RETURNING {column}"
    );
    sqlx::query_scalar(&sql)
        .bind(post_id)
        .bind(delta)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)
}
