//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use harvest_market_core::{CityId, Email, StateId, UserId, UserRole, UserStatus};

/// A marketplace account.
///
/// The password hash lives in `market.user_password` and never leaves the
/// repository layer.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub avatar_url: Option<String>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the account may sign in and act.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Public profile fragment embedded in other payloads.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub avatar_url: Option<String>,
}
