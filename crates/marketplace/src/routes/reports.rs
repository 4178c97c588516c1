//! User reports of abusive or misleading content.

use axum::{Router, extract::State, http::StatusCode, routing::post};
use serde::Deserialize;
use tracing::instrument;

use harvest_market_core::ReportTarget;

use crate::db::ReportRepository;
use crate::db::reports::NewReport;
use crate::error::{AppError, Result};
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::models::Report;
use crate::state::AppState;
use crate::validation;

const MAX_REASON_LENGTH: usize = 200;
const MAX_DETAILS_LENGTH: usize = 2000;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(create))
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub target_type: ReportTarget,
    pub target_id: i32,
    pub reason: String,
    pub details: Option<String>,
}

#[instrument(skip(state, user, body), fields(user_id = %user.id, target = %body.target_type, target_id = body.target_id))]
async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<ReportRequest>,
) -> Result<(StatusCode, Json<Report>)> {
    if body.target_type == ReportTarget::User && body.target_id == user.id.as_i32() {
        return Err(AppError::BadRequest("You cannot report yourself".to_string()));
    }

    let report = NewReport {
        target_type: body.target_type,
        target_id: body.target_id,
        reason: validation::required_text("reason", &body.reason, MAX_REASON_LENGTH)?,
        details: validation::optional_text(
            "details",
            body.details.as_deref(),
            MAX_DETAILS_LENGTH,
        )?,
    };

    let repo = ReportRepository::new(state.pool());
    if !repo.target_exists(report.target_type, report.target_id).await? {
        return Err(AppError::NotFound(format!(
            "{} not found",
            report.target_type
        )));
    }

    let report = repo.create(user.id, &report).await?;
    tracing::info!(report_id = %report.id, "Report filed");
    Ok((StatusCode::CREATED, Json(report)))
}
