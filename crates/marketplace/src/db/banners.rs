//! Homepage banners.

use sqlx::PgPool;

use harvest_market_core::BannerId;

use super::RepositoryError;
use crate::models::Banner;

const BANNER_COLUMNS: &str =
    "id, title, image_url, link_url, position, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct BannerInput {
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
    pub position: i32,
    pub is_active: bool,
}

/// Repository for banners.
pub struct BannerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BannerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Banners ordered for display; inactive ones only when asked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Banner>, RepositoryError> {
        let sql = format!(
            "SELECT {BANNER_COLUMNS} FROM market.banner WHERE $1 OR is_active \
             ORDER BY position ASC, id ASC"
        );
        let banners = sqlx::query_as::<_, Banner>(&sql)
            .bind(include_inactive)
            .fetch_all(self.pool)
            .await?;
        Ok(banners)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &BannerInput) -> Result<Banner, RepositoryError> {
        let sql = format!(
            "INSERT INTO market.banner (title, image_url, link_url, position, is_active) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {BANNER_COLUMNS}"
        );
        let banner = sqlx::query_as::<_, Banner>(&sql)
            .bind(&input.title)
            .bind(&input.image_url)
            .bind(input.link_url.as_deref())
            .bind(input.position)
            .bind(input.is_active)
            .fetch_one(self.pool)
            .await?;
        Ok(banner)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner does not exist.
    pub async fn update(&self, id: BannerId, input: &BannerInput) -> Result<Banner, RepositoryError> {
        let sql = format!(
            "UPDATE market.banner SET title = $2, image_url = $3, link_url = $4, position = $5, \
             is_active = $6, updated_at = NOW() WHERE id = $1 RETURNING {BANNER_COLUMNS}"
        );
        sqlx::query_as::<_, Banner>(&sql)
            .bind(id)
            .bind(&input.title)
            .bind(&input.image_url)
            .bind(input.link_url.as_deref())
            .bind(input.position)
            .bind(input.is_active)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner does not exist.
    pub async fn delete(&self, id: BannerId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM market.banner WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
