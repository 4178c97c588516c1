//! Rental vehicle domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use harvest_market_core::{CityId, Price, StateId, UserId, VehicleId, VehicleStatus};

/// Farm equipment or transport offered for rent by the day.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Vehicle {
    pub id: VehicleId,
    pub owner_id: UserId,
    pub owner_name: String,
    pub name: String,
    /// Free-form kind such as "tractor" or "truck".
    pub kind: String,
    pub description: Option<String>,
    pub price_per_day: Price,
    pub image_urls: Vec<String>,
    pub status: VehicleStatus,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
