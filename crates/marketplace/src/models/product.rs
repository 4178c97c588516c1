//! Product and rating domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use harvest_market_core::{
    CategoryId, Price, ProductId, ProductStatus, RatingId, StoreId, UnitId, UserId,
};

/// A produce listing, with the display names of its store, category and unit.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub store_name: String,
    pub owner_id: UserId,
    pub category_id: CategoryId,
    pub category_name: String,
    pub unit_id: UnitId,
    pub unit_abbreviation: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub quantity: i32,
    pub image_urls: Vec<String>,
    pub status: ProductStatus,
    pub is_featured: bool,
    pub rating_count: i32,
    pub rating_average: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One user's score for a product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Rating {
    pub id: RatingId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub user_name: String,
    pub score: i16,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
