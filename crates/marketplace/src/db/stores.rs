//! Store repository.

use sqlx::PgPool;

use harvest_market_core::{
    CityId, NotificationKind, Page, PageRequest, StateId, StoreId, UserId,
};

use super::notifications::{self, NewNotification};
use super::{RepositoryError, like_pattern};
use crate::models::Store;

const STORE_SELECT: &str = r"
    SELECT s.id, s.owner_id, u.name AS owner_name, s.name, s.description,
           s.logo_url, s.banner_url, s.phone, s.address, s.state_id, s.city_id,
           s.followers_count,
           (SELECT COUNT(*) FROM market.product p
             WHERE p.store_id = s.id AND p.deleted_at IS NULL AND p.status = 'active')
             AS product_count,
           s.created_at, s.updated_at
    FROM market.store s
    JOIN market.user u ON u.id = s.owner_id
";

/// Editable store fields.
#[derive(Debug, Clone)]
pub struct StoreInput {
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
}

/// Filters for the public store directory.
#[derive(Debug, Default)]
pub struct StoreFilter {
    pub q: Option<String>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
}

/// Repository for stores and their followers.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List stores, most followed first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &StoreFilter,
        page: PageRequest,
    ) -> Result<Page<Store>, RepositoryError> {
        let pattern = filter.q.as_deref().map(like_pattern);
        let predicate = r"
            ($1::text IS NULL OR s.name ILIKE $1 OR s.description ILIKE $1)
            AND ($2::int IS NULL OR s.state_id = $2)
            AND ($3::int IS NULL OR s.city_id = $3)
        ";

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{STORE_SELECT} WHERE {predicate} \
             ORDER BY s.followers_count DESC, s.id DESC LIMIT $4 OFFSET $5"
        );
        let items = sqlx::query_as::<_, Store>(&sql)
            .bind(pattern.as_deref())
            .bind(filter.state_id)
            .bind(filter.city_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM market.store s WHERE {predicate}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(pattern.as_deref())
            .bind(filter.state_id)
            .bind(filter.city_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let sql = format!("{STORE_SELECT} WHERE s.id = $1");
        let store = sqlx::query_as::<_, Store>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(store)
    }

    /// The store owned by `owner_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_owner(&self, owner_id: UserId) -> Result<Option<Store>, RepositoryError> {
        let sql = format!("{STORE_SELECT} WHERE s.owner_id = $1");
        let store = sqlx::query_as::<_, Store>(&sql)
            .bind(owner_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(store)
    }

    /// Open a store for `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the owner already has a store.
    pub async fn create(&self, owner_id: UserId, input: &StoreInput) -> Result<Store, RepositoryError> {
        let id: StoreId = sqlx::query_scalar(
            r"
            INSERT INTO market.store
                (owner_id, name, description, logo_url, banner_url, phone, address, state_id, city_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(owner_id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.logo_url.as_deref())
        .bind(input.banner_url.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.address.as_deref())
        .bind(input.state_id)
        .bind(input.city_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "you already have a store"))?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn update(&self, id: StoreId, input: &StoreInput) -> Result<Store, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE market.store
            SET name = $2, description = $3, logo_url = $4, banner_url = $5,
                phone = $6, address = $7, state_id = $8, city_id = $9, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.logo_url.as_deref())
        .bind(input.banner_url.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.address.as_deref())
        .bind(input.state_id)
        .bind(input.city_id)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "store conflict"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a store together with its products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the store does not exist.
    pub async fn delete(&self, id: StoreId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM market.store WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Whether `user_id` follows the store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_following(&self, id: StoreId, user_id: UserId) -> Result<bool, RepositoryError> {
        let following: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM market.store_follower WHERE store_id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(following)
    }

    /// Follow a store. Returns the follower count after the call.
    ///
    /// Following twice is a no-op; the counter and owner notification only
    /// happen when a row is inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn follow(
        &self,
        store: &Store,
        follower_id: UserId,
        follower_name: &str,
    ) -> Result<i32, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO market.store_follower (store_id, user_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(store.id)
        .bind(follower_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let count: i32 = if inserted == 1 {
            let count = sqlx::query_scalar(
                "UPDATE market.store SET followers_count = followers_count + 1 \
                 WHERE id = $1 RETURNING followers_count",
            )
            .bind(store.id)
            .fetch_one(&mut *tx)
            .await?;

            let notification = NewNotification::new(
                store.owner_id,
                NotificationKind::Follow,
                "New follower",
                format!("{follower_name} started following {}", store.name),
            )
            .with_link(format!("/stores/{}", store.id));
            notifications::insert_in(&mut tx, &notification).await?;

            count
        } else {
            sqlx::query_scalar("SELECT followers_count FROM market.store WHERE id = $1")
                .bind(store.id)
                .fetch_one(&mut *tx)
                .await?
        };

        tx.commit().await?;
        Ok(count)
    }

    /// Unfollow a store. Returns the follower count after the call.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unfollow(&self, id: StoreId, follower_id: UserId) -> Result<i32, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM market.store_follower WHERE store_id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(follower_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let sql = if removed == 1 {
            "UPDATE market.store SET followers_count = GREATEST(followers_count - 1, 0) \
             WHERE id = $1 RETURNING followers_count"
        } else {
            "SELECT followers_count FROM market.store WHERE id = $1"
        };
        let count: i32 = sqlx::query_scalar(sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(count)
    }
}
