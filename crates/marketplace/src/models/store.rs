//! Store domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use harvest_market_core::{CityId, StateId, StoreId, UserId};

/// A seller's storefront. Each seller owns at most one.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Store {
    pub id: StoreId,
    pub owner_id: UserId,
    pub owner_name: String,
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub followers_count: i32,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
