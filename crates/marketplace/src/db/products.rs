//! Product repository.
//!
//! Deleting a product sets `deleted_at`; deleted rows are invisible to every
//! query here but keep ratings, wishlists and conversations referencing them
//! intact.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use harvest_market_core::{
    CategoryId, CityId, Page, PageRequest, Price, ProductId, ProductStatus, StateId, StoreId,
    UnitId,
};

use super::{RepositoryError, like_pattern};
use crate::models::Product;

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.store_id, s.name AS store_name, s.owner_id,
           p.category_id, c.name AS category_name,
           p.unit_id, un.abbreviation AS unit_abbreviation,
           p.name, p.description, p.price, p.quantity, p.image_urls, p.status,
           p.is_featured, p.rating_count, p.rating_average, p.created_at, p.updated_at
    FROM market.product p
    JOIN market.store s ON s.id = p.store_id
    JOIN market.category c ON c.id = p.category_id
    JOIN market.unit un ON un.id = p.unit_id
";

const PRODUCT_FROM: &str = r"
    FROM market.product p
    JOIN market.store s ON s.id = p.store_id
";

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
}

impl ProductSort {
    /// `ORDER BY` clause; `id` breaks ties so pages are stable.
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Rating => "p.rating_average DESC, p.rating_count DESC, p.id DESC",
        }
    }
}

/// Filters for the public catalogue.
#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    pub q: Option<String>,
    pub category_id: Option<CategoryId>,
    pub store_id: Option<StoreId>,
    /// Location of the selling store.
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
}

/// Product fields written on create and update.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub category_id: CategoryId,
    pub unit_id: UnitId,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub quantity: i32,
    pub image_urls: Vec<String>,
    pub status: ProductStatus,
    pub is_featured: bool,
}

/// Repository for products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Search active products.
    ///
    /// The page and the total count are read in one transaction so they agree.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn search(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, RepositoryError> {
        let pattern = filter.q.as_deref().map(like_pattern);
        let predicate = r"
            p.deleted_at IS NULL AND p.status = 'active'
            AND ($1::text IS NULL OR p.name ILIKE $1 OR p.description ILIKE $1)
            AND ($2::int IS NULL OR p.category_id = $2)
            AND ($3::int IS NULL OR p.store_id = $3)
            AND ($4::int IS NULL OR s.state_id = $4)
            AND ($5::int IS NULL OR s.city_id = $5)
            AND ($6::numeric IS NULL OR p.price >= $6)
            AND ($7::numeric IS NULL OR p.price <= $7)
        ";

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{PRODUCT_SELECT} WHERE {predicate} ORDER BY {} LIMIT $8 OFFSET $9",
            filter.sort.order_by()
        );
        let items = sqlx::query_as::<_, Product>(&sql)
            .bind(pattern.as_deref())
            .bind(filter.category_id)
            .bind(filter.store_id)
            .bind(filter.state_id)
            .bind(filter.city_id)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let count_sql = format!("SELECT COUNT(*) {PRODUCT_FROM} WHERE {predicate}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(pattern.as_deref())
            .bind(filter.category_id)
            .bind(filter.store_id)
            .bind(filter.state_id)
            .bind(filter.city_id)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// Products of one store, newest first.
    ///
    /// Inactive products are only included for the owner's own views.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_store(
        &self,
        store_id: StoreId,
        include_inactive: bool,
        page: PageRequest,
    ) -> Result<Page<Product>, RepositoryError> {
        let predicate = "p.deleted_at IS NULL AND p.store_id = $1 AND ($2 OR p.status = 'active')";

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{PRODUCT_SELECT} WHERE {predicate} ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $3 OFFSET $4"
        );
        let items = sqlx::query_as::<_, Product>(&sql)
            .bind(store_id)
            .bind(include_inactive)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let count_sql = format!("SELECT COUNT(*) {PRODUCT_FROM} WHERE {predicate}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(store_id)
            .bind(include_inactive)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// Get a non-deleted product regardless of status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = $1 AND p.deleted_at IS NULL");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidReference` for an unknown category or unit.
    pub async fn create(
        &self,
        store_id: StoreId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO market.product
                (store_id, category_id, unit_id, name, description, price, quantity,
                 image_urls, status, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            ",
        )
        .bind(store_id)
        .bind(input.category_id)
        .bind(input.unit_id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.quantity)
        .bind(&input.image_urls)
        .bind(input.status)
        .bind(input.is_featured)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product conflict"))?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist or is
    /// deleted, `RepositoryError::InvalidReference` for an unknown category or unit.
    pub async fn update(&self, id: ProductId, input: &ProductInput) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE market.product
            SET category_id = $2, unit_id = $3, name = $4, description = $5, price = $6,
                quantity = $7, image_urls = $8, status = $9, is_featured = $10,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(id)
        .bind(input.category_id)
        .bind(input.unit_id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.price)
        .bind(input.quantity)
        .bind(&input.image_urls)
        .bind(input.status)
        .bind(input.is_featured)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product conflict"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Soft-delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it is missing or already deleted.
    pub async fn soft_delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE market.product SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct SortQuery {
        #[serde(default)]
        sort: ProductSort,
    }

    #[test]
    fn test_sort_parses_from_query_names() {
        let q: SortQuery = serde_json::from_str(r#"{"sort":"price_desc"}"#).unwrap();
        assert_eq!(q.sort, ProductSort::PriceDesc);

        let q: SortQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.sort, ProductSort::Newest);

        assert!(serde_json::from_str::<SortQuery>(r#"{"sort":"id; DROP TABLE"}"#).is_err());
    }

    #[test]
    fn test_every_sort_has_a_tiebreaker() {
        for sort in [
            ProductSort::Newest,
            ProductSort::PriceAsc,
            ProductSort::PriceDesc,
            ProductSort::Rating,
        ] {
            assert!(sort.order_by().contains("p.id"), "{sort:?}");
        }
    }
}
