//! Report queue and community management.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post, put},
};
use serde::Deserialize;
use tracing::instrument;

use harvest_market_core::{CommunityId, Page, PageRequest, ReportId, ReportStatus};

use crate::db::communities::CommunityInput;
use crate::db::{CommunityRepository, ReportRepository};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::{Community, Report};
use crate::state::AppState;
use crate::validation::{self, ValidationError};

const MAX_COMMUNITY_NAME: usize = 100;
const MAX_COMMUNITY_DESCRIPTION: usize = 2000;
const MAX_RESOLUTION_NOTE: usize = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports", get(reports))
        .route("/reports/{id}", patch(resolve_report))
        .route("/communities", post(create_community))
        .route("/communities/{id}", put(update_community).delete(delete_community))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub status: ReportStatus,
    pub resolution_note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommunityRequest {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl CommunityRequest {
    fn into_input(self) -> std::result::Result<CommunityInput, ValidationError> {
        Ok(CommunityInput {
            name: validation::required_text("name", &self.name, MAX_COMMUNITY_NAME)?,
            description: validation::optional_text(
                "description",
                self.description.as_deref(),
                MAX_COMMUNITY_DESCRIPTION,
            )?,
            image_url: validation::optional_url("image_url", self.image_url.as_deref())?,
        })
    }
}

/// A report can only be closed, never reopened.
fn closing_status(status: ReportStatus) -> Result<ReportStatus> {
    match status {
        ReportStatus::Resolved | ReportStatus::Dismissed => Ok(status),
        ReportStatus::Open => Err(AppError::BadRequest(
            "status must be resolved or dismissed".to_string(),
        )),
    }
}

async fn reports(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Page<Report>>> {
    Ok(Json(
        ReportRepository::new(state.pool())
            .list(query.status, page)
            .await?,
    ))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, status = %body.status))]
async fn resolve_report(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ReportId>,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<Report>> {
    let status = closing_status(body.status)?;
    let note = validation::optional_text(
        "resolution_note",
        body.resolution_note.as_deref(),
        MAX_RESOLUTION_NOTE,
    )?;

    let report = ReportRepository::new(state.pool())
        .resolve(id, status, note.as_deref(), admin.id)
        .await?;
    tracing::info!(report_id = %id, "Report closed");
    Ok(Json(report))
}

async fn create_community(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<CommunityRequest>,
) -> Result<(StatusCode, Json<Community>)> {
    let input = body.into_input()?;
    let community = CommunityRepository::new(state.pool())
        .create(&input, admin.id)
        .await?;
    tracing::info!(community_id = %community.id, "Community created");
    Ok((StatusCode::CREATED, Json(community)))
}

async fn update_community(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CommunityId>,
    Json(body): Json<CommunityRequest>,
) -> Result<Json<Community>> {
    let input = body.into_input()?;
    Ok(Json(
        CommunityRepository::new(state.pool())
            .update(id, &input)
            .await?,
    ))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
async fn delete_community(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CommunityId>,
) -> Result<StatusCode> {
    CommunityRepository::new(state.pool()).delete(id).await?;
    tracing::info!(community_id = %id, "Community deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_closing_status() {
        assert_eq!(
            closing_status(ReportStatus::Resolved).unwrap(),
            ReportStatus::Resolved
        );
        assert_eq!(
            closing_status(ReportStatus::Dismissed).unwrap(),
            ReportStatus::Dismissed
        );
        assert!(matches!(
            closing_status(ReportStatus::Open),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_community_request_validation() {
        let input = CommunityRequest {
            name: " Tomato Growers ".to_string(),
            description: None,
            image_url: Some("/uploads/communities/a.png".to_string()),
        }
        .into_input()
        .unwrap();
        assert_eq!(input.name, "Tomato Growers");

        let bad = CommunityRequest {
            name: "Growers".to_string(),
            description: None,
            image_url: Some("ftp://example.com/a.png".to_string()),
        }
        .into_input();
        assert!(bad.is_err());
    }
}
