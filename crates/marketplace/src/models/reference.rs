//! Reference data: locations, categories and units of measure.

use serde::Serialize;

use harvest_market_core::{CategoryId, CityId, StateId, UnitId};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct State {
    pub id: StateId,
    pub name: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct City {
    pub id: CityId,
    pub state_id: StateId,
    pub name: String,
}

/// Product category. `slug` is derived from the name on write.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Unit of measure a product is sold in ("Kilogram", "kg").
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub abbreviation: String,
}
