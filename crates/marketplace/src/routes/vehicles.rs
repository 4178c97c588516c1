//! Rental vehicle listings.

use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::Deserialize;
use tracing::instrument;

use harvest_market_core::{CityId, Page, PageRequest, Price, StateId, VehicleId, VehicleStatus};

use crate::db::VehicleRepository;
use crate::db::vehicles::{VehicleFilter, VehicleInput};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::{RequireAuth, RequireSeller};
use crate::models::Vehicle;
use crate::routes::reference::check_location;
use crate::routes::{ensure_owner_or_admin, found};
use crate::state::AppState;
use crate::validation;

const MAX_NAME_LENGTH: usize = 200;
const MAX_KIND_LENGTH: usize = 50;
const MAX_DESCRIPTION_LENGTH: usize = 5000;
const MAX_IMAGES: usize = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/vehicles", get(index).post(create))
        .route("/vehicles/{id}", get(show).put(update).delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
pub struct VehicleQuery {
    pub q: Option<String>,
    pub kind: Option<String>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub status: Option<VehicleStatus>,
}

#[derive(Debug, Deserialize)]
pub struct VehicleRequest {
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
    pub price_per_day: Price,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub status: Option<VehicleStatus>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
}

/// Status an owner edit leaves the vehicle in.
///
/// `booked` is only ever set by confirming a booking, and a booked vehicle
/// stays booked until that booking ends.
fn owner_status(
    current: Option<VehicleStatus>,
    requested: Option<VehicleStatus>,
) -> Result<VehicleStatus> {
    if requested == Some(VehicleStatus::Booked) {
        return Err(AppError::BadRequest(
            "status 'booked' is set by confirming a booking".to_string(),
        ));
    }
    Ok(match current {
        Some(VehicleStatus::Booked) => VehicleStatus::Booked,
        Some(current) => requested.unwrap_or(current),
        None => requested.unwrap_or(VehicleStatus::Available),
    })
}

impl VehicleRequest {
    fn validate(self, current: Option<VehicleStatus>) -> Result<VehicleInput> {
        Ok(VehicleInput {
            name: validation::required_text("name", &self.name, MAX_NAME_LENGTH)?,
            kind: validation::required_text("kind", &self.kind, MAX_KIND_LENGTH)?.to_lowercase(),
            description: validation::optional_text(
                "description",
                self.description.as_deref(),
                MAX_DESCRIPTION_LENGTH,
            )?,
            price_per_day: self.price_per_day,
            image_urls: validation::image_urls("image_urls", &self.image_urls, MAX_IMAGES)?,
            status: owner_status(current, self.status)?,
            state_id: self.state_id,
            city_id: self.city_id,
        })
    }
}

async fn index(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(query): Query<VehicleQuery>,
) -> Result<Json<Page<Vehicle>>> {
    let filter = VehicleFilter {
        q: query.q.filter(|q| !q.trim().is_empty()),
        kind: query.kind.filter(|kind| !kind.trim().is_empty()),
        state_id: query.state_id,
        city_id: query.city_id,
        status: query.status,
        owner_id: None,
    };
    Ok(Json(VehicleRepository::new(state.pool()).list(&filter, page).await?))
}

async fn show(State(state): State<AppState>, Path(id): Path<VehicleId>) -> Result<Json<Vehicle>> {
    let vehicle = found(VehicleRepository::new(state.pool()).get(id).await?, "Vehicle")?;
    Ok(Json(vehicle))
}

#[instrument(skip(state, seller, body), fields(user_id = %seller.id))]
async fn create(
    State(state): State<AppState>,
    RequireSeller(seller): RequireSeller,
    Json(body): Json<VehicleRequest>,
) -> Result<(StatusCode, Json<Vehicle>)> {
    let input = body.validate(None)?;
    check_location(state.pool(), input.state_id, input.city_id).await?;

    let vehicle = VehicleRepository::new(state.pool())
        .create(seller.id, &input)
        .await?;
    tracing::info!(vehicle_id = %vehicle.id, "Vehicle listed");
    Ok((StatusCode::CREATED, Json(vehicle)))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<VehicleId>,
    Json(body): Json<VehicleRequest>,
) -> Result<Json<Vehicle>> {
    let repo = VehicleRepository::new(state.pool());
    let existing = found(repo.get(id).await?, "Vehicle")?;
    ensure_owner_or_admin(&user, existing.owner_id)?;

    let input = body.validate(Some(existing.status))?;
    check_location(state.pool(), input.state_id, input.city_id).await?;

    Ok(Json(repo.update(id, &input).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn destroy(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<VehicleId>,
) -> Result<StatusCode> {
    let repo = VehicleRepository::new(state.pool());
    let existing = found(repo.get(id).await?, "Vehicle")?;
    ensure_owner_or_admin(&user, existing.owner_id)?;

    repo.soft_delete(id).await?;
    tracing::info!(vehicle_id = %id, "Vehicle deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_vehicle_defaults_to_available() {
        assert!(matches!(owner_status(None, None), Ok(VehicleStatus::Available)));
        assert!(matches!(
            owner_status(None, Some(VehicleStatus::Maintenance)),
            Ok(VehicleStatus::Maintenance)
        ));
    }

    #[test]
    fn test_owner_cannot_mark_booked() {
        assert!(owner_status(None, Some(VehicleStatus::Booked)).is_err());
        assert!(owner_status(Some(VehicleStatus::Available), Some(VehicleStatus::Booked)).is_err());
    }

    #[test]
    fn test_booked_vehicle_stays_booked() {
        assert!(matches!(
            owner_status(Some(VehicleStatus::Booked), Some(VehicleStatus::Maintenance)),
            Ok(VehicleStatus::Booked)
        ));
    }

    #[test]
    fn test_edit_without_status_keeps_current() {
        assert!(matches!(
            owner_status(Some(VehicleStatus::Maintenance), None),
            Ok(VehicleStatus::Maintenance)
        ));
    }
}
