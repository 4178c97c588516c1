//! Vehicle bookings.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use harvest_market_core::{BookingId, BookingStatus, Page, PageRequest, VehicleId};

use crate::db::BookingRepository;
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAuth;
use crate::models::Booking;
use crate::routes::found;
use crate::services::bookings::{BookingRequest, BookingService, MAX_NOTES_LENGTH};
use crate::state::AppState;
use crate::validation;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(index).post(create))
        .route("/bookings/{id}", get(show))
        .route("/bookings/{id}/status", patch(update_status))
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub vehicle_id: VehicleId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
}

async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Booking>>> {
    let bookings = BookingRepository::new(state.pool())
        .list_for_renter(user.id, page)
        .await?;
    Ok(Json(bookings))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id, vehicle_id = %body.vehicle_id))]
async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>)> {
    let notes = validation::optional_text("notes", body.notes.as_deref(), MAX_NOTES_LENGTH)?;
    let request = BookingRequest {
        vehicle_id: body.vehicle_id,
        start_date: body.start_date,
        end_date: body.end_date,
        notes,
    };

    let booking = BookingService::new(state.pool())
        .create(&user, request, Utc::now().date_naive())
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<BookingId>,
) -> Result<Json<Booking>> {
    let booking = found(BookingRepository::new(state.pool()).get(id).await?, "Booking")?;
    if !BookingService::can_view(&booking, &user, user.is_admin()) {
        return Err(AppError::Forbidden(
            "You do not have access to this booking".to_string(),
        ));
    }
    Ok(Json(booking))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id, to = %body.status))]
async fn update_status(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<BookingId>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Booking>> {
    let booking = BookingService::new(state.pool())
        .update_status(&user, id, body.status)
        .await?;
    Ok(Json(booking))
}
