//! Aggregate counts for the admin and seller dashboards.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use harvest_market_core::{BookingStatus, UserId, UserRole};

use super::RepositoryError;

/// Site-wide counts for the admin console.
#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub users_by_role: BTreeMap<String, i64>,
    pub blocked_users: i64,
    pub stores: i64,
    pub products: i64,
    pub vehicles: i64,
    pub bookings_by_status: BTreeMap<String, i64>,
    pub open_reports: i64,
    pub posts: i64,
}

/// Counts scoped to one seller's store and vehicles.
#[derive(Debug, Clone, Serialize)]
pub struct SellerStats {
    pub products_total: i64,
    pub products_active: i64,
    pub vehicles: i64,
    pub bookings_by_status: BTreeMap<String, i64>,
    pub followers: i64,
    /// Mean of the per-product averages over rated products.
    pub average_rating: Option<Decimal>,
}

#[derive(sqlx::FromRow)]
struct Totals {
    blocked_users: i64,
    stores: i64,
    products: i64,
    vehicles: i64,
    open_reports: i64,
    posts: i64,
}

#[derive(sqlx::FromRow)]
struct SellerTotals {
    products_total: i64,
    products_active: i64,
    vehicles: i64,
    followers: i64,
    average_rating: Option<Decimal>,
}

/// Fill in zero for every status so clients see a stable shape.
fn booking_counts(rows: Vec<(BookingStatus, i64)>) -> BTreeMap<String, i64> {
    let mut counts: BTreeMap<String, i64> = BookingStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_owned(), 0))
        .collect();
    for (status, n) in rows {
        counts.insert(status.as_str().to_owned(), n);
    }
    counts
}

/// Repository for dashboard aggregates.
pub struct StatsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn admin(&self) -> Result<AdminStats, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let roles: Vec<(UserRole, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM market.user GROUP BY role")
                .fetch_all(&mut *tx)
                .await?;

        let bookings: Vec<(BookingStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM market.booking GROUP BY status")
                .fetch_all(&mut *tx)
                .await?;

        let totals = sqlx::query_as::<_, Totals>(
            r"
            SELECT
                (SELECT COUNT(*) FROM market.user WHERE status = 'blocked') AS blocked_users,
                (SELECT COUNT(*) FROM market.store) AS stores,
                (SELECT COUNT(*) FROM market.product WHERE deleted_at IS NULL) AS products,
                (SELECT COUNT(*) FROM market.vehicle WHERE deleted_at IS NULL) AS vehicles,
                (SELECT COUNT(*) FROM market.report WHERE status = 'open') AS open_reports,
                (SELECT COUNT(*) FROM market.community_post) AS posts
            ",
        )
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut users_by_role: BTreeMap<String, i64> = UserRole::ALL
            .iter()
            .map(|r| (r.as_str().to_owned(), 0))
            .collect();
        for (role, n) in roles {
            users_by_role.insert(role.as_str().to_owned(), n);
        }

        Ok(AdminStats {
            users_by_role,
            blocked_users: totals.blocked_users,
            stores: totals.stores,
            products: totals.products,
            vehicles: totals.vehicles,
            bookings_by_status: booking_counts(bookings),
            open_reports: totals.open_reports,
            posts: totals.posts,
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn seller(&self, owner_id: UserId) -> Result<SellerStats, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let bookings: Vec<(BookingStatus, i64)> = sqlx::query_as(
            r"
            SELECT b.status, COUNT(*)
            FROM market.booking b
            JOIN market.vehicle v ON v.id = b.vehicle_id
            WHERE v.owner_id = $1
            GROUP BY b.status
            ",
        )
        .bind(owner_id)
        .fetch_all(&mut *tx)
        .await?;

        let totals = sqlx::query_as::<_, SellerTotals>(
            r"
            SELECT
                (SELECT COUNT(*) FROM market.product p JOIN market.store s ON s.id = p.store_id
                  WHERE s.owner_id = $1 AND p.deleted_at IS NULL) AS products_total,
                (SELECT COUNT(*) FROM market.product p JOIN market.store s ON s.id = p.store_id
                  WHERE s.owner_id = $1 AND p.deleted_at IS NULL AND p.status = 'active')
                  AS products_active,
                (SELECT COUNT(*) FROM market.vehicle
                  WHERE owner_id = $1 AND deleted_at IS NULL) AS vehicles,
                (SELECT COALESCE(SUM(followers_count), 0)::bigint FROM market.store
                  WHERE owner_id = $1) AS followers,
                (SELECT ROUND(AVG(p.rating_average), 2)
                   FROM market.product p JOIN market.store s ON s.id = p.store_id
                  WHERE s.owner_id = $1 AND p.deleted_at IS NULL AND p.rating_count > 0)
                  AS average_rating
            ",
        )
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SellerStats {
            products_total: totals.products_total,
            products_active: totals.products_active,
            vehicles: totals.vehicles,
            bookings_by_status: booking_counts(bookings),
            followers: totals.followers,
            average_rating: totals.average_rating,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_counts_fill_missing_statuses() {
        let counts = booking_counts(vec![(BookingStatus::Confirmed, 3)]);
        assert_eq!(counts.len(), BookingStatus::ALL.len());
        assert_eq!(counts["confirmed"], 3);
        assert_eq!(counts["pending"], 0);
    }
}
