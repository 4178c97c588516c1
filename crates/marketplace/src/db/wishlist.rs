//! Wishlist items.

use sqlx::PgPool;

use harvest_market_core::{Page, PageRequest, ProductId, UserId};

use super::RepositoryError;
use crate::models::Product;

/// Repository for a user's saved products.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Saved products that are still listed, most recently saved first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId, page: PageRequest) -> Result<Page<Product>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let items = sqlx::query_as::<_, Product>(
            r"
            SELECT p.id, p.store_id, s.name AS store_name, s.owner_id,
                   p.category_id, c.name AS category_name,
                   p.unit_id, un.abbreviation AS unit_abbreviation,
                   p.name, p.description, p.price, p.quantity, p.image_urls, p.status,
                   p.is_featured, p.rating_count, p.rating_average, p.created_at, p.updated_at
            FROM market.wishlist_item w
            JOIN market.product p ON p.id = w.product_id
            JOIN market.store s ON s.id = p.store_id
            JOIN market.category c ON c.id = p.category_id
            JOIN market.unit un ON un.id = p.unit_id
            WHERE w.user_id = $1 AND p.deleted_at IS NULL
            ORDER BY w.created_at DESC, p.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *tx)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM market.wishlist_item w
            JOIN market.product p ON p.id = w.product_id
            WHERE w.user_id = $1 AND p.deleted_at IS NULL
            ",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// Save a product. Saving twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is unknown or deleted.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO market.wishlist_item (user_id, product_id)
            SELECT $1, id FROM market.product WHERE id = $2 AND deleted_at IS NULL
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Either already saved or the product is gone.
            let listed: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM market.product WHERE id = $1 AND deleted_at IS NULL)",
            )
            .bind(product_id)
            .fetch_one(self.pool)
            .await?;

            if !listed {
                return Err(RepositoryError::NotFound);
            }
        }
        Ok(())
    }

    /// Remove a product. Removing something not saved is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM market.wishlist_item WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
