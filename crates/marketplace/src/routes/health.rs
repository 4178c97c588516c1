//! Health checks for the load balancer, mounted at the root rather than under `/api`.

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(live))
        .route("/health/ready", get(ready))
}

/// The process is up and serving requests.
async fn live() -> &'static str {
    "ok"
}

/// Postgres answers a trivial query; 503 otherwise.
async fn ready(State(state): State<AppState>) -> StatusCode {
    let check = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(state.pool())
        .await;

    if let Err(e) = check {
        tracing::warn!(error = %e, "database not ready");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}
