//! Community groups and membership.

use sqlx::PgPool;

use harvest_market_core::{CommunityId, Page, PageRequest, UserId};

use super::{RepositoryError, like_pattern};
use crate::models::Community;

/// `$1` is the viewer (nullable) used for `is_member`.
const COMMUNITY_SELECT: &str = r"
    SELECT c.id, c.name, c.description, c.image_url, c.members_count,
           EXISTS(SELECT 1 FROM market.community_member m
                  WHERE m.community_id = c.id AND m.user_id = $1) AS is_member,
           c.created_at, c.updated_at
    FROM market.community c
";

#[derive(Debug, Clone)]
pub struct CommunityInput {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Repository for communities.
pub struct CommunityRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CommunityRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Communities ordered by size.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        viewer: Option<UserId>,
        q: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Community>, RepositoryError> {
        let pattern = q.map(like_pattern);

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{COMMUNITY_SELECT} WHERE ($2::text IS NULL OR c.name ILIKE $2) \
             ORDER BY c.members_count DESC, c.id ASC LIMIT $3 OFFSET $4"
        );
        let items = sqlx::query_as::<_, Community>(&sql)
            .bind(viewer)
            .bind(pattern.as_deref())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM market.community c WHERE ($1::text IS NULL OR c.name ILIKE $1)",
        )
        .bind(pattern.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: CommunityId,
        viewer: Option<UserId>,
    ) -> Result<Option<Community>, RepositoryError> {
        let sql = format!("{COMMUNITY_SELECT} WHERE c.id = $2");
        let community = sqlx::query_as::<_, Community>(&sql)
            .bind(viewer)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(community)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(
        &self,
        input: &CommunityInput,
        created_by: UserId,
    ) -> Result<Community, RepositoryError> {
        let id: CommunityId = sqlx::query_scalar(
            "INSERT INTO market.community (name, description, image_url, created_by) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.image_url.as_deref())
        .bind(created_by)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "community already exists"))?;

        self.get(id, Some(created_by))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        id: CommunityId,
        input: &CommunityInput,
    ) -> Result<Community, RepositoryError> {
        let result = sqlx::query(
            "UPDATE market.community SET name = $2, description = $3, image_url = $4, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.image_url.as_deref())
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "community already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id, None).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a community with its posts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist.
    pub async fn delete(&self, id: CommunityId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM market.community WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_member(&self, id: CommunityId, user_id: UserId) -> Result<bool, RepositoryError> {
        let member: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM market.community_member \
             WHERE community_id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(member)
    }

    /// Join a community. Returns the member count afterwards.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the community does not exist.
    pub async fn join(&self, id: CommunityId, user_id: UserId) -> Result<i32, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO market.community_member (community_id, user_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| match RepositoryError::from_write(e, "already a member") {
            RepositoryError::InvalidReference(_) => RepositoryError::NotFound,
            other => other,
        })?
        .rows_affected();

        let count = member_count_after(&mut tx, id, i32::from(inserted == 1)).await?;

        tx.commit().await?;
        Ok(count)
    }

    /// Leave a community. Returns the member count afterwards.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the community does not exist.
    pub async fn leave(&self, id: CommunityId, user_id: UserId) -> Result<i32, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM market.community_member WHERE community_id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let count = member_count_after(&mut tx, id, -i32::from(removed == 1)).await?;

        tx.commit().await?;
        Ok(count)
    }
}

async fn member_count_after(
    conn: &mut sqlx::PgConnection,
    id: CommunityId,
    delta: i32,
) -> Result<i32, RepositoryError> {
    sqlx::query_scalar(
        "UPDATE market.community SET members_count = GREATEST(members_count + $2, 0) \
         WHERE id = $1 RETURNING members_count",
    )
    .bind(id)
    .bind(delta)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}
