//! Reference data: states, cities, categories and units.
//!
//! Names are unique case-insensitively (cities per state). The `find_*`
//! lookups back duplicate detection in the CSV importer.

use sqlx::PgPool;

use harvest_market_core::{CategoryId, CityId, StateId, UnitId};

use super::RepositoryError;
use crate::models::{Category, City, State, Unit};

/// Category fields for insert and update.
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UnitInput {
    pub name: String,
    pub abbreviation: String,
}

#[derive(Debug, Clone)]
pub struct StateInput {
    pub name: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CityInput {
    pub state_id: StateId,
    pub name: String,
}

/// Map a delete failure caused by rows still pointing at the target.
fn in_use(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::Conflict(format!("{what} is still in use"));
    }
    RepositoryError::Database(err)
}

fn deleted(rows: u64) -> Result<(), RepositoryError> {
    if rows == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

/// Repository for reference data.
pub struct ReferenceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReferenceRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // -- States -------------------------------------------------------------

    /// All states ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_states(&self) -> Result<Vec<State>, RepositoryError> {
        let states =
            sqlx::query_as::<_, State>("SELECT id, name, code FROM market.state ORDER BY name")
                .fetch_all(self.pool)
                .await?;
        Ok(states)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_state(&self, id: StateId) -> Result<Option<State>, RepositoryError> {
        let state =
            sqlx::query_as::<_, State>("SELECT id, name, code FROM market.state WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(state)
    }

    /// Case-insensitive lookup by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_state(&self, name: &str) -> Result<Option<State>, RepositoryError> {
        let state = sqlx::query_as::<_, State>(
            "SELECT id, name, code FROM market.state WHERE LOWER(name) = LOWER($1)",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;
        Ok(state)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create_state(&self, input: &StateInput) -> Result<State, RepositoryError> {
        sqlx::query_as::<_, State>(
            "INSERT INTO market.state (name, code) VALUES ($1, $2) RETURNING id, name, code",
        )
        .bind(&input.name)
        .bind(input.code.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "state already exists"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update_state(
        &self,
        id: StateId,
        input: &StateInput,
    ) -> Result<State, RepositoryError> {
        sqlx::query_as::<_, State>(
            "UPDATE market.state SET name = $2, code = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING id, name, code",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.code.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "state already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a state and, by cascade, its cities.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the state does not exist.
    pub async fn delete_state(&self, id: StateId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM market.state WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| in_use(e, "state"))?;
        deleted(result.rows_affected())
    }

    // -- Cities -------------------------------------------------------------

    /// Cities of a state ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_cities(&self, state_id: StateId) -> Result<Vec<City>, RepositoryError> {
        let cities = sqlx::query_as::<_, City>(
            "SELECT id, state_id, name FROM market.city WHERE state_id = $1 ORDER BY name",
        )
        .bind(state_id)
        .fetch_all(self.pool)
        .await?;
        Ok(cities)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_city(&self, id: CityId) -> Result<Option<City>, RepositoryError> {
        let city =
            sqlx::query_as::<_, City>("SELECT id, state_id, name FROM market.city WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(city)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_city(
        &self,
        state_id: StateId,
        name: &str,
    ) -> Result<Option<City>, RepositoryError> {
        let city = sqlx::query_as::<_, City>(
            "SELECT id, state_id, name FROM market.city \
             WHERE state_id = $1 AND LOWER(name) = LOWER($2)",
        )
        .bind(state_id)
        .bind(name)
        .fetch_optional(self.pool)
        .await?;
        Ok(city)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the state already has a city
    /// with that name, `RepositoryError::InvalidReference` for an unknown state.
    pub async fn create_city(&self, input: &CityInput) -> Result<City, RepositoryError> {
        sqlx::query_as::<_, City>(
            "INSERT INTO market.city (state_id, name) VALUES ($1, $2) RETURNING id, state_id, name",
        )
        .bind(input.state_id)
        .bind(&input.name)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "city already exists in this state"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound`, `Conflict` or `InvalidReference`.
    pub async fn update_city(&self, id: CityId, input: &CityInput) -> Result<City, RepositoryError> {
        sqlx::query_as::<_, City>(
            "UPDATE market.city SET state_id = $2, name = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING id, state_id, name",
        )
        .bind(id)
        .bind(input.state_id)
        .bind(&input.name)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "city already exists in this state"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the city does not exist.
    pub async fn delete_city(&self, id: CityId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM market.city WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| in_use(e, "city"))?;
        deleted(result.rows_affected())
    }

    // -- Categories ---------------------------------------------------------

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, image_url FROM market.category ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn category_exists(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM market.category WHERE id = $1)")
                .bind(id)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Lookup by name or slug, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_category(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, image_url FROM market.category \
             WHERE LOWER(name) = LOWER($1) OR slug = $2",
        )
        .bind(name)
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name or slug is taken.
    pub async fn create_category(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            r"
            INSERT INTO market.category (name, slug, description, image_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, slug, description, image_url
            ",
        )
        .bind(&input.name)
        .bind(&input.slug)
        .bind(input.description.as_deref())
        .bind(input.image_url.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "category already exists"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            r"
            UPDATE market.category
            SET name = $2, slug = $3, description = $4, image_url = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, slug, description, image_url
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.slug)
        .bind(input.description.as_deref())
        .bind(input.image_url.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "category already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while products still use the
    /// category, `RepositoryError::NotFound` if it does not exist.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM market.category WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| in_use(e, "category"))?;
        deleted(result.rows_affected())
    }

    // -- Units --------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_units(&self) -> Result<Vec<Unit>, RepositoryError> {
        let units = sqlx::query_as::<_, Unit>(
            "SELECT id, name, abbreviation FROM market.unit ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(units)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unit_exists(&self, id: UnitId) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM market.unit WHERE id = $1)")
                .bind(id)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_unit(&self, name: &str) -> Result<Option<Unit>, RepositoryError> {
        let unit = sqlx::query_as::<_, Unit>(
            "SELECT id, name, abbreviation FROM market.unit WHERE LOWER(name) = LOWER($1)",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;
        Ok(unit)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create_unit(&self, input: &UnitInput) -> Result<Unit, RepositoryError> {
        sqlx::query_as::<_, Unit>(
            "INSERT INTO market.unit (name, abbreviation) VALUES ($1, $2) \
             RETURNING id, name, abbreviation",
        )
        .bind(&input.name)
        .bind(&input.abbreviation)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "unit already exists"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update_unit(&self, id: UnitId, input: &UnitInput) -> Result<Unit, RepositoryError> {
        sqlx::query_as::<_, Unit>(
            "UPDATE market.unit SET name = $2, abbreviation = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING id, name, abbreviation",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.abbreviation)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "unit already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while products still use the unit.
    pub async fn delete_unit(&self, id: UnitId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM market.unit WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| in_use(e, "unit"))?;
        deleted(result.rows_affected())
    }
}
