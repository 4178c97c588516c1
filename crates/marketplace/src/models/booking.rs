//! Vehicle booking domain type.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use harvest_market_core::{BookingActor, BookingId, BookingStatus, Price, UserId, VehicleId};

/// A rental request for a date range (both ends inclusive).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Booking {
    pub id: BookingId,
    pub vehicle_id: VehicleId,
    pub vehicle_name: String,
    pub owner_id: UserId,
    pub renter_id: UserId,
    pub renter_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: Price,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// The role `user` plays on this booking, if any.
    #[must_use]
    pub fn actor(&self, user: UserId) -> Option<BookingActor> {
        if user == self.owner_id {
            Some(BookingActor::Owner)
        } else if user == self.renter_id {
            Some(BookingActor::Renter)
        } else {
            None
        }
    }

    /// The other party, who gets notified when `user` acts.
    #[must_use]
    pub fn counterpart(&self, user: UserId) -> UserId {
        if user == self.owner_id {
            self.renter_id
        } else {
            self.owner_id
        }
    }
}
