//! Vehicle booking rules and the transactions that enforce them.
//!
//! Date and price rules are pure functions so they can be tested without a
//! database. [`BookingService`] wraps every multi-row write (booking, vehicle
//! status, notification) in one transaction with the booking or vehicle row
//! locked `FOR UPDATE`.

use chrono::NaiveDate;
use sqlx::PgPool;
use thiserror::Error;

use harvest_market_core::{
    BookingId, BookingStatus, NotificationKind, Price, VehicleId, VehicleStatus,
};

use crate::db::bookings::{self, NewBooking};
use crate::db::notifications::{self, NewNotification};
use crate::db::{RepositoryError, vehicles};
use crate::models::{Booking, CurrentUser};

/// Longest rental accepted in one booking.
pub const MAX_RENTAL_DAYS: i64 = 365;

/// Longest free-text note on a booking.
pub const MAX_NOTES_LENGTH: usize = 1000;

/// Errors raised by booking operations.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("booking not found")]
    NotFound,

    #[error("vehicle not found")]
    VehicleNotFound,

    #[error("you are not allowed to change this booking")]
    Forbidden,

    #[error("cannot move a booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("{0}")]
    InvalidDates(String),

    #[error("vehicle is not available for booking")]
    Unavailable,

    #[error("vehicle is already booked for those dates")]
    Overlap,

    #[error("you cannot book your own vehicle")]
    OwnVehicle,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Check a requested rental window against `today`.
///
/// # Errors
///
/// Returns `BookingError::InvalidDates` if the range is reversed, starts in
/// the past or exceeds [`MAX_RENTAL_DAYS`].
pub fn validate_dates(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<(), BookingError> {
    if end < start {
        return Err(BookingError::InvalidDates(
            "end_date must not be before start_date".to_string(),
        ));
    }
    if start < today {
        return Err(BookingError::InvalidDates(
            "start_date cannot be in the past".to_string(),
        ));
    }
    if rental_days(start, end) > MAX_RENTAL_DAYS {
        return Err(BookingError::InvalidDates(format!(
            "bookings are limited to {MAX_RENTAL_DAYS} days"
        )));
    }
    Ok(())
}

/// Number of rental days, counting both ends.
#[must_use]
pub fn rental_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Total price for renting at `per_day` from `start` to `end` inclusive.
///
/// # Errors
///
/// Returns `BookingError::InvalidDates` if the total overflows the price
/// column.
pub fn quote(per_day: Price, start: NaiveDate, end: NaiveDate) -> Result<Price, BookingError> {
    u32::try_from(rental_days(start, end))
        .ok()
        .and_then(|days| per_day.times(days))
        .ok_or_else(|| BookingError::InvalidDates("rental total is too large".to_string()))
}

/// A renter's booking request as received from the client.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub vehicle_id: VehicleId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
}

/// Booking workflows.
pub struct BookingService<'a> {
    pool: &'a PgPool,
}

impl<'a> BookingService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending booking and notify the vehicle owner.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::VehicleNotFound` for an unknown or deleted
    /// vehicle; see [`BookingError`] for the other rules.
    #[tracing::instrument(skip(self, renter, request), fields(vehicle_id = %request.vehicle_id, renter_id = %renter.id))]
    pub async fn create(
        &self,
        renter: &CurrentUser,
        request: BookingRequest,
        today: NaiveDate,
    ) -> Result<Booking, BookingError> {
        validate_dates(request.start_date, request.end_date, today)?;

        let mut tx = self.pool.begin().await?;

        let vehicle = vehicles::lock_in(&mut tx, request.vehicle_id)
            .await?
            .ok_or(BookingError::VehicleNotFound)?;

        if vehicle.owner_id == renter.id {
            return Err(BookingError::OwnVehicle);
        }
        if vehicle.status == VehicleStatus::Maintenance {
            return Err(BookingError::Unavailable);
        }
        if bookings::overlaps_confirmed_in(
            &mut tx,
            vehicle.id,
            request.start_date,
            request.end_date,
        )
        .await?
        {
            return Err(BookingError::Overlap);
        }

        let total_price = quote(vehicle.price_per_day, request.start_date, request.end_date)?;

        let booking = bookings::insert_in(
            &mut tx,
            &NewBooking {
                vehicle_id: vehicle.id,
                renter_id: renter.id,
                start_date: request.start_date,
                end_date: request.end_date,
                total_price,
                notes: request.notes,
            },
        )
        .await?;

        let notification = NewNotification::new(
            vehicle.owner_id,
            NotificationKind::Booking,
            "New booking request",
            format!(
                "{} wants to rent {} from {} to {}",
                renter.name, vehicle.name, booking.start_date, booking.end_date
            ),
        )
        .with_link(format!("/seller/bookings/{}", booking.id));
        notifications::insert_in(&mut tx, &notification).await?;

        tx.commit().await?;

        tracing::info!(booking_id = %booking.id, total = %booking.total_price, "Booking requested");
        Ok(booking)
    }

    /// Move a booking to `next`, updating the vehicle and notifying the
    /// counterpart.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::NotFound` if the booking does not exist,
    /// `BookingError::Unavailable` when confirming on a deleted vehicle,
    /// `BookingError::Forbidden` if the caller is neither renter nor owner or
    /// may not make this move, `BookingError::InvalidTransition` if no one
    /// may, and `BookingError::Overlap` when confirming over another
    /// confirmed booking.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.id))]
    pub async fn update_status(
        &self,
        actor: &CurrentUser,
        id: BookingId,
        next: BookingStatus,
    ) -> Result<Booking, BookingError> {
        let mut tx = self.pool.begin().await?;

        // Vehicle before booking, the same order `create` and vehicle
        // deletion take their locks in. Confirmations of different bookings
        // on one vehicle queue here.
        let vehicle_id = bookings::vehicle_of(&mut tx, id)
            .await?
            .ok_or(BookingError::NotFound)?;
        let vehicle_live = vehicles::lock_any_in(&mut tx, vehicle_id)
            .await?
            .ok_or(BookingError::NotFound)?;
        let booking = bookings::lock_in(&mut tx, id)
            .await?
            .ok_or(BookingError::NotFound)?;

        let role = booking.actor(actor.id).ok_or(BookingError::Forbidden)?;
        let current = booking.status;

        if !current.can_transition_to(next) {
            return Err(BookingError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        if !current.allows(next, role) {
            return Err(BookingError::Forbidden);
        }

        if next == BookingStatus::Confirmed && !vehicle_live {
            return Err(BookingError::Unavailable);
        }
        if next == BookingStatus::Confirmed
            && bookings::overlaps_confirmed_in(
                &mut tx,
                booking.vehicle_id,
                booking.start_date,
                booking.end_date,
            )
            .await?
        {
            return Err(BookingError::Overlap);
        }

        bookings::set_status_in(&mut tx, booking.id, next).await?;

        if let Some(vehicle_status) = current.vehicle_status_after(next) {
            vehicles::set_status_in(&mut tx, booking.vehicle_id, vehicle_status).await?;
        }

        let recipient = booking.counterpart(actor.id);
        let notification = NewNotification::new(
            recipient,
            NotificationKind::Booking,
            format!("Booking {next}"),
            format!(
                "Your booking for {} ({} to {}) is now {next}",
                booking.vehicle_name, booking.start_date, booking.end_date
            ),
        )
        .with_link(format!("/bookings/{}", booking.id));
        notifications::insert_in(&mut tx, &notification).await?;

        let updated = bookings::lock_in(&mut tx, booking.id)
            .await?
            .ok_or(BookingError::NotFound)?;

        tx.commit().await?;

        tracing::info!(booking_id = %id, from = %current, to = %next, "Booking status changed");
        Ok(updated)
    }

    /// Whether `user` may view a booking.
    #[must_use]
    pub fn can_view(booking: &Booking, user: &CurrentUser, is_admin: bool) -> bool {
        is_admin || booking.actor(user.id).is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_same_day_rental_is_one_day() {
        assert_eq!(rental_days(date(2026, 6, 1), date(2026, 6, 1)), 1);
        assert_eq!(rental_days(date(2026, 6, 1), date(2026, 6, 3)), 3);
    }

    #[test]
    fn test_validate_dates_rejects_reversed_range() {
        let today = date(2026, 6, 1);
        assert!(matches!(
            validate_dates(date(2026, 6, 5), date(2026, 6, 4), today),
            Err(BookingError::InvalidDates(_))
        ));
    }

    #[test]
    fn test_validate_dates_rejects_past_start() {
        let today = date(2026, 6, 10);
        assert!(validate_dates(date(2026, 6, 9), date(2026, 6, 12), today).is_err());
        assert!(validate_dates(date(2026, 6, 10), date(2026, 6, 12), today).is_ok());
    }

    #[test]
    fn test_validate_dates_caps_length() {
        let today = date(2026, 1, 1);
        assert!(validate_dates(today, date(2026, 12, 31), today).is_ok());
        assert!(validate_dates(today, date(2027, 1, 1), today).is_err());
    }

    #[test]
    fn test_quote_is_inclusive() {
        let per_day = Price::new(Decimal::new(12_050, 2)).unwrap();
        let total = quote(per_day, date(2026, 6, 1), date(2026, 6, 3)).unwrap();
        assert_eq!(total.amount(), Decimal::new(36_150, 2));
    }

    #[test]
    fn test_quote_overflow_is_rejected() {
        let per_day = Price::new(Decimal::new(9_000_000_000, 0)).unwrap();
        assert!(quote(per_day, date(2026, 6, 1), date(2026, 6, 2)).is_err());
    }
}
