//! Site-wide counters.

use axum::extract::State;

use crate::db::StatsRepository;
use crate::db::stats::AdminStats;
use crate::error::Result;
use crate::extract::Json;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

pub async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<AdminStats>> {
    Ok(Json(StatsRepository::new(state.pool()).admin().await?))
}
