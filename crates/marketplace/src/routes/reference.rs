//! Public reference data, served from the moka cache.

use axum::{Router, extract::State, routing::get};
use sqlx::PgPool;

use harvest_market_core::{CityId, StateId};

use crate::db::ReferenceRepository;
use crate::error::{AppError, Result};
use crate::extract::{Json, Path};
use crate::models::{Category, City, State as Region, Unit};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(categories))
        .route("/units", get(units))
        .route("/states", get(states))
        .route("/states/{id}/cities", get(cities))
}

async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let list = state.reference_cache().categories(state.pool()).await?;
    Ok(Json(list.as_ref().clone()))
}

async fn units(State(state): State<AppState>) -> Result<Json<Vec<Unit>>> {
    let list = state.reference_cache().units(state.pool()).await?;
    Ok(Json(list.as_ref().clone()))
}

async fn states(State(state): State<AppState>) -> Result<Json<Vec<Region>>> {
    let list = state.reference_cache().states(state.pool()).await?;
    Ok(Json(list.as_ref().clone()))
}

async fn cities(
    State(state): State<AppState>,
    Path(id): Path<StateId>,
) -> Result<Json<Vec<City>>> {
    let exists = state
        .reference_cache()
        .states(state.pool())
        .await?
        .iter()
        .any(|region| region.id == id);
    if !exists {
        return Err(AppError::NotFound("State not found".to_string()));
    }
    let list = state.reference_cache().cities(state.pool(), id).await?;
    Ok(Json(list.as_ref().clone()))
}

/// Reject a city that lies outside the chosen state.
///
/// Unknown ids are left to the foreign keys, which surface as 400.
pub(crate) async fn check_location(
    pool: &PgPool,
    state_id: Option<StateId>,
    city_id: Option<CityId>,
) -> Result<()> {
    let (Some(state_id), Some(city_id)) = (state_id, city_id) else {
        return Ok(());
    };

    match ReferenceRepository::new(pool).get_city(city_id).await? {
        Some(city) if city.state_id != state_id => Err(AppError::BadRequest(
            "City does not belong to the selected state".to_string(),
        )),
        _ => Ok(()),
    }
}
