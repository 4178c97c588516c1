//! Booking repository.
//!
//! Reads go through [`BookingRepository`]. Writes are free functions on a
//! connection so that `services::bookings` can combine them with vehicle
//! updates and notifications in a single transaction.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use harvest_market_core::{
    BookingId, BookingStatus, Page, PageRequest, Price, UserId, VehicleId,
};

use super::RepositoryError;
use crate::models::Booking;

const BOOKING_SELECT: &str = r"
    SELECT b.id, b.vehicle_id, v.name AS vehicle_name, v.owner_id,
           b.renter_id, u.name AS renter_name, b.start_date, b.end_date,
           b.total_price, b.status, b.notes, b.created_at, b.updated_at
    FROM market.booking b
    JOIN market.vehicle v ON v.id = b.vehicle_id
    JOIN market.user u ON u.id = b.renter_id
";

const BOOKING_FROM: &str = r"
    FROM market.booking b
    JOIN market.vehicle v ON v.id = b.vehicle_id
";

/// A validated booking request ready to insert.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub vehicle_id: VehicleId,
    pub renter_id: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: Price,
    pub notes: Option<String>,
}

/// Repository for reading bookings.
pub struct BookingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BookingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        let sql = format!("{BOOKING_SELECT} WHERE b.id = $1");
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(booking)
    }

    /// Bookings requested by `renter_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_renter(
        &self,
        renter_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Booking>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{BOOKING_SELECT} WHERE b.renter_id = $1 \
             ORDER BY b.created_at DESC, b.id DESC LIMIT $2 OFFSET $3"
        );
        let items = sqlx::query_as::<_, Booking>(&sql)
            .bind(renter_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM market.booking WHERE renter_id = $1")
            .bind(renter_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// Bookings on vehicles owned by `owner_id`, optionally by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_owner(
        &self,
        owner_id: UserId,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Result<Page<Booking>, RepositoryError> {
        let predicate =
            "v.owner_id = $1 AND ($2::market.booking_status IS NULL OR b.status = $2)";

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{BOOKING_SELECT} WHERE {predicate} \
             ORDER BY b.start_date DESC, b.id DESC LIMIT $3 OFFSET $4"
        );
        let items = sqlx::query_as::<_, Booking>(&sql)
            .bind(owner_id)
            .bind(status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let count_sql = format!("SELECT COUNT(*) {BOOKING_FROM} WHERE {predicate}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(owner_id)
            .bind(status)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }
}

/// Whether a confirmed booking on the vehicle overlaps `[start, end]`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn overlaps_confirmed_in(
    conn: &mut PgConnection,
    vehicle_id: VehicleId,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<bool, RepositoryError> {
    let overlaps: bool = sqlx::query_scalar(
        r"
        SELECT EXISTS(
            SELECT 1 FROM market.booking
            WHERE vehicle_id = $1 AND status = 'confirmed'
              AND start_date <= $3 AND end_date >= $2
        )
        ",
    )
    .bind(vehicle_id)
    .bind(start)
    .bind(end)
    .fetch_one(conn)
    .await?;
    Ok(overlaps)
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_in(conn: &mut PgConnection, new: &NewBooking) -> Result<Booking, RepositoryError> {
    let id: BookingId = sqlx::query_scalar(
        r"
        INSERT INTO market.booking (vehicle_id, renter_id, start_date, end_date, total_price, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        ",
    )
    .bind(new.vehicle_id)
    .bind(new.renter_id)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(new.total_price)
    .bind(new.notes.as_deref())
    .fetch_one(&mut *conn)
    .await?;

    let sql = format!("{BOOKING_SELECT} WHERE b.id = $1");
    let booking = sqlx::query_as::<_, Booking>(&sql)
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(booking)
}

/// Load a booking and lock its row until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_in(conn: &mut PgConnection, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
    let sql = format!("{BOOKING_SELECT} WHERE b.id = $1 FOR UPDATE OF b");
    let booking = sqlx::query_as::<_, Booking>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(booking)
}

/// Vehicle a booking belongs to. Never changes, so no lock is taken.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn vehicle_of(conn: &mut PgConnection, id: BookingId) -> Result<Option<VehicleId>, RepositoryError> {
    let vehicle_id = sqlx::query_scalar::<_, VehicleId>(
        "SELECT vehicle_id FROM market.booking WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(vehicle_id)
}

/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_status_in(
    conn: &mut PgConnection,
    id: BookingId,
    status: BookingStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE market.booking SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(conn)
        .await?;
    Ok(())
}
