//! Product ratings.
//!
//! `product.rating_count` and `product.rating_average` are recomputed from
//! the rating rows in the same transaction as every rating write.

use sqlx::{PgConnection, PgPool};

use harvest_market_core::{Page, PageRequest, ProductId, RatingId, UserId};

use super::RepositoryError;
use crate::models::Rating;

const RATING_SELECT: &str = r"
    SELECT r.id, r.product_id, r.user_id, u.name AS user_name, r.score, r.review,
           r.created_at, r.updated_at
    FROM market.rating r
    JOIN market.user u ON u.id = r.user_id
";

/// Recompute `rating_count` and `rating_average` from the rating rows.
pub(crate) async fn refresh_aggregate(conn: &mut PgConnection, product_id: ProductId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE market.product p
        SET rating_count = agg.n,
            rating_average = agg.avg
        FROM (
            SELECT COUNT(*)::int AS n,
                   COALESCE(ROUND(AVG(score)::numeric, 2), 0) AS avg
            FROM market.rating
            WHERE product_id = $1
        ) agg
        WHERE p.id = $1
        ",
    )
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Repository for product ratings.
pub struct RatingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RatingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Ratings for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        product_id: ProductId,
        page: PageRequest,
    ) -> Result<Page<Rating>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{RATING_SELECT} WHERE r.product_id = $1 \
             ORDER BY r.updated_at DESC, r.id DESC LIMIT $2 OFFSET $3"
        );
        let items = sqlx::query_as::<_, Rating>(&sql)
            .bind(product_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM market.rating WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// Create or replace the caller's rating.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        product_id: ProductId,
        user_id: UserId,
        score: i16,
        review: Option<&str>,
    ) -> Result<Rating, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: RatingId = sqlx::query_scalar(
            r"
            INSERT INTO market.rating (product_id, user_id, score, review)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id, user_id) DO UPDATE
                SET score = EXCLUDED.score, review = EXCLUDED.review, updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(score)
        .bind(review)
        .fetch_one(&mut *tx)
        .await?;

        refresh_aggregate(&mut tx, product_id).await?;

        let sql = format!("{RATING_SELECT} WHERE r.id = $1");
        let rating = sqlx::query_as::<_, Rating>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(rating)
    }

    /// Remove the caller's rating.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the caller has not rated the product.
    pub async fn delete(&self, product_id: ProductId, user_id: UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM market.rating WHERE product_id = $1 AND user_id = $2")
            .bind(product_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        refresh_aggregate(&mut tx, product_id).await?;

        tx.commit().await?;
        Ok(())
    }
}
