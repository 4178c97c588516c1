//! User repository for database operations.
//!
//! Accounts live in `market.user`; Argon2 hashes are kept apart in
//! `market.user_password` so that listing queries never touch them.

use sqlx::{PgConnection, PgPool};

use harvest_market_core::{
    CityId, Email, Page, PageRequest, ProductId, StateId, UserId, UserRole, UserStatus,
    VehicleId,
};

use super::{RepositoryError, like_pattern, ratings};
use crate::models::User;

const USER_COLUMNS: &str = "u.id, u.name, u.email, u.phone, u.role, u.status, u.avatar_url, \
                            u.state_id, u.city_id, u.created_at, u.updated_at";

/// Fields for a new account.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a Email,
    pub phone: Option<&'a str>,
    pub role: UserRole,
}

/// Profile fields a user may change. `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
}

/// Filters for the admin user listing.
#[derive(Debug, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub q: Option<String>,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM market.user u WHERE u.id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM market.user u WHERE u.email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Create a new user with a password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create_with_password(
        &self,
        new: &NewUser<'_>,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user = insert_user(&mut tx, new).await?;

        sqlx::query(
            "INSERT INTO market.user_password (user_id, password_hash) VALUES ($1, $2)",
        )
        .bind(user.id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(user)
    }

    /// Create an admin account, or promote and re-password an existing one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_admin(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r"
            INSERT INTO market.user AS u (name, email, role, status)
            VALUES ($1, $2, 'admin', 'active')
            ON CONFLICT (email) DO UPDATE
                SET role = 'admin', status = 'active', updated_at = NOW()
            RETURNING {USER_COLUMNS}
            "
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(name)
            .bind(email)
            .fetch_one(&mut *tx)
            .await?;

        set_password_in(&mut tx, user.id, password_hash).await?;

        tx.commit().await?;

        Ok(user)
    }

    /// Get a user together with their password hash.
    ///
    /// Returns `None` if the user doesn't exist or has no password set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let Some(user) = self.get_by_email(email).await? else {
            return Ok(None);
        };

        let hash = self.password_hash(user.id).await?;
        Ok(hash.map(|h| (user, h)))
    }

    /// Get the stored password hash for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM market.user_password WHERE user_id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(hash)
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_password(&self, id: UserId, password_hash: &str) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        set_password_in(&mut conn, id, password_hash).await
    }

    /// Apply a profile update and return the new row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::InvalidReference` for an unknown state or city.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let sql = format!(
            r"
            UPDATE market.user AS u
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                avatar_url = COALESCE($4, avatar_url),
                state_id = COALESCE($5, state_id),
                city_id = COALESCE($6, city_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.phone.as_deref())
            .bind(update.avatar_url.as_deref())
            .bind(update.state_id)
            .bind(update.city_id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "profile conflict"))?
            .ok_or(RepositoryError::NotFound)
    }

    /// List users for the admin console, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<Page<User>, RepositoryError> {
        let pattern = filter.q.as_deref().map(like_pattern);
        let predicate = r"
            ($1::market.user_role IS NULL OR u.role = $1)
            AND ($2::market.user_status IS NULL OR u.status = $2)
            AND ($3::text IS NULL OR u.name ILIKE $3 OR u.email ILIKE $3)
        ";

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM market.user u WHERE {predicate} \
             ORDER BY u.created_at DESC, u.id DESC LIMIT $4 OFFSET $5"
        );
        let items = sqlx::query_as::<_, User>(&sql)
            .bind(filter.role)
            .bind(filter.status)
            .bind(pattern.as_deref())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *tx)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM market.user u WHERE {predicate}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.role)
            .bind(filter.status)
            .bind(pattern.as_deref())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Page::new(items, total, page))
    }

    /// Block or unblock an account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_status(&self, id: UserId, status: UserStatus) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE market.user AS u SET status = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Change an account's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_role(&self, id: UserId, role: UserRole) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE market.user AS u SET role = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete an account and everything it owns.
    ///
    /// The cascade removes the user's follows, memberships, likes, comments,
    /// ratings and bookings. The counters and statuses derived from those
    /// rows are brought back in step in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // New follows, likes and memberships reference the user row, so
        // they wait behind this lock until the delete commits.
        let exists: Option<UserId> =
            sqlx::query_scalar("SELECT id FROM market.user WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        release_counters(&mut tx, id).await?;

        let rated: Vec<ProductId> = sqlx::query_scalar(
            "SELECT product_id FROM market.rating WHERE user_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let rented: Vec<VehicleId> = sqlx::query_scalar(
            "SELECT DISTINCT vehicle_id FROM market.booking \
             WHERE renter_id = $1 AND status = 'confirmed'",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM market.user WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for product_id in rated {
            ratings::refresh_aggregate(&mut tx, product_id).await?;
        }

        for vehicle_id in rented {
            sqlx::query(
                r"
                UPDATE market.vehicle v
                SET status = 'available', updated_at = NOW()
                WHERE v.id = $1 AND v.status = 'booked'
                  AND NOT EXISTS (
                      SELECT 1 FROM market.booking b
                      WHERE b.vehicle_id = v.id AND b.status = 'confirmed'
                  )
                ",
            )
            .bind(vehicle_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Take a user's follows, memberships, likes and comments out of the
/// denormalised counters before the rows themselves cascade away.
async fn release_counters(conn: &mut PgConnection, id: UserId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE market.store s
        SET followers_count = s.followers_count - 1
        FROM market.store_follower f
        WHERE f.store_id = s.id AND f.user_id = $1
        ",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r"
        UPDATE market.community c
        SET members_count = c.members_count - 1
        FROM market.community_member m
        WHERE m.community_id = c.id AND m.user_id = $1
        ",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r"
        UPDATE market.community_post p
        SET like_count = p.like_count - 1
        FROM market.community_like l
        WHERE l.post_id = p.id AND l.user_id = $1
        ",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r"
        UPDATE market.community_post p
        SET comment_count = p.comment_count - c.n
        FROM (
            SELECT post_id, COUNT(*)::int AS n
            FROM market.community_comment
            WHERE author_id = $1
            GROUP BY post_id
        ) c
        WHERE c.post_id = p.id
        ",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_user(conn: &mut PgConnection, new: &NewUser<'_>) -> Result<User, RepositoryError> {
    let sql = format!(
        r"
        INSERT INTO market.user AS u (name, email, phone, role)
        VALUES ($1, $2, $3, $4)
        RETURNING {USER_COLUMNS}
        "
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(new.name)
        .bind(new.email)
        .bind(new.phone)
        .bind(new.role)
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::from_write(e, "email already exists"))
}

async fn set_password_in(
    conn: &mut PgConnection,
    id: UserId,
    password_hash: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO market.user_password (user_id, password_hash)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE
            SET password_hash = EXCLUDED.password_hash, updated_at = NOW()
        ",
    )
    .bind(id)
    .bind(password_hash)
    .execute(conn)
    .await?;
    Ok(())
}
