//! Vehicle repository.

use chrono::NaiveDate;
use sqlx::PgPool;

use harvest_market_core::{
    BookingId, CityId, NotificationKind, Page, PageRequest, Price, StateId, UserId, VehicleId,
    VehicleStatus,
};

use super::notifications::{self, NewNotification};
use super::{RepositoryError, like_pattern};
use crate::models::Vehicle;

const VEHICLE_SELECT: &str = r"
    SELECT v.id, v.owner_id, u.name AS owner_name, v.name, v.kind, v.description,
           v.price_per_day, v.image_urls, v.status, v.state_id, v.city_id,
           v.created_at, v.updated_at
    FROM market.vehicle v
    JOIN market.user u ON u.id = v.owner_id
";

#[derive(Debug, Default, Clone)]
pub struct VehicleFilter {
    pub q: Option<String>,
    pub kind: Option<String>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub status: Option<VehicleStatus>,
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone)]
pub struct VehicleInput {
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
    pub price_per_day: Price,
    pub image_urls: Vec<String>,
    pub status: VehicleStatus,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
}

/// Repository for rental vehicles.
pub struct VehicleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VehicleRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &VehicleFilter,
        page: PageRequest,
    ) -> Result<Page<Vehicle>, RepositoryError> {
        let pattern = filter.q.as_deref().map(like_pattern);
        let predicate = r"
            v.deleted_at IS NULL
            AND ($1::text IS NULL OR v.name ILIKE $1 OR v.description ILIKE $1)
            AND ($2::text IS NULL OR LOWER(v.kind) = LOWER($2))
            AND ($3::int IS NULL OR v.state_id = $3)
            AND ($4::int IS NULL OR v.city_id = $4)
            AND ($5::market.vehicle_status IS NULL OR v.status = $5)
            AND ($6::int IS NULL OR v.owner_id = $6)
        ";

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "{VEHICLE_SELECT} WHERE {predicate} \
             ORDER BY v.created_at DESC, v.id DESC LIMIT $7 OFFSET $8"
        );
        let items = sqlx::query_as::<_, Vehicle>(&sql)
            .bind(pattern.as_deref())
            .bind(filter.kind.as_deref())
            .bind(filter.state_id)
            .bind(filter.city_id)
            .bind(filter.status)
            .bind(filter.owner_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM market.vehicle v WHERE {predicate}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(pattern.as_deref())
            .bind(filter.kind.as_deref())
            .bind(filter.state_id)
            .bind(filter.city_id)
            .bind(filter.status)
            .bind(filter.owner_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: VehicleId) -> Result<Option<Vehicle>, RepositoryError> {
        let sql = format!("{VEHICLE_SELECT} WHERE v.id = $1 AND v.deleted_at IS NULL");
        let vehicle = sqlx::query_as::<_, Vehicle>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(vehicle)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidReference` for an unknown state or city.
    pub async fn create(&self, owner_id: UserId, input: &VehicleInput) -> Result<Vehicle, RepositoryError> {
        let id: VehicleId = sqlx::query_scalar(
            r"
            INSERT INTO market.vehicle
                (owner_id, name, kind, description, price_per_day, image_urls, status, state_id, city_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(owner_id)
        .bind(&input.name)
        .bind(&input.kind)
        .bind(input.description.as_deref())
        .bind(input.price_per_day)
        .bind(&input.image_urls)
        .bind(input.status)
        .bind(input.state_id)
        .bind(input.city_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "vehicle conflict"))?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the vehicle is missing or deleted.
    pub async fn update(&self, id: VehicleId, input: &VehicleInput) -> Result<Vehicle, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE market.vehicle
            SET name = $2, kind = $3, description = $4, price_per_day = $5, image_urls = $6,
                status = $7, state_id = $8, city_id = $9, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.kind)
        .bind(input.description.as_deref())
        .bind(input.price_per_day)
        .bind(&input.image_urls)
        .bind(input.status)
        .bind(input.state_id)
        .bind(input.city_id)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "vehicle conflict"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Soft-delete a vehicle that has no confirmed booking.
    ///
    /// Pending bookings on the vehicle are cancelled and their renters
    /// notified in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while a confirmed booking exists,
    /// `RepositoryError::NotFound` if the vehicle is missing or deleted.
    pub async fn soft_delete(&self, id: VehicleId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let name: Option<String> = sqlx::query_scalar(
            "SELECT name FROM market.vehicle WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(name) = name else {
            return Err(RepositoryError::NotFound);
        };

        let confirmed: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM market.booking WHERE vehicle_id = $1 AND status = 'confirmed')",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if confirmed {
            return Err(RepositoryError::Conflict(
                "vehicle has a confirmed booking".to_owned(),
            ));
        }

        let cancelled: Vec<(BookingId, UserId, NaiveDate, NaiveDate)> = sqlx::query_as(
            "UPDATE market.booking SET status = 'cancelled', updated_at = NOW() \
             WHERE vehicle_id = $1 AND status = 'pending' \
             RETURNING id, renter_id, start_date, end_date",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for (booking_id, renter_id, start, end) in &cancelled {
            let notification = NewNotification::new(
                *renter_id,
                NotificationKind::Booking,
                "Booking cancelled",
                format!("{name} was withdrawn by its owner, so your booking for {start} to {end} is cancelled"),
            )
            .with_link(format!("/bookings/{booking_id}"));
            notifications::insert_in(&mut tx, &notification).await?;
        }

        sqlx::query("UPDATE market.vehicle SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Lock a live vehicle row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_in(
    conn: &mut sqlx::PgConnection,
    id: VehicleId,
) -> Result<Option<Vehicle>, RepositoryError> {
    let sql = format!("{VEHICLE_SELECT} WHERE v.id = $1 AND v.deleted_at IS NULL FOR UPDATE OF v");
    let vehicle = sqlx::query_as::<_, Vehicle>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(vehicle)
}

/// Lock a vehicle row, live or soft-deleted.
///
/// Returns `Some(true)` for a live vehicle, `Some(false)` for a deleted one
/// and `None` if the row does not exist.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_any_in(
    conn: &mut sqlx::PgConnection,
    id: VehicleId,
) -> Result<Option<bool>, RepositoryError> {
    let live = sqlx::query_scalar::<_, bool>(
        "SELECT deleted_at IS NULL FROM market.vehicle WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(live)
}

/// Set a vehicle's availability inside an open transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_status_in(
    conn: &mut sqlx::PgConnection,
    id: VehicleId,
    status: VehicleStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE market.vehicle SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(conn)
        .await?;
    Ok(())
}
