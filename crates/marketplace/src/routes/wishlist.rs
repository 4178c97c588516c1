//! Saved products.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get},
};
use serde::Deserialize;

use harvest_market_core::{Page, PageRequest, ProductId};

use crate::db::WishlistRepository;
use crate::error::Result;
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAuth;
use crate::models::Product;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index).post(add))
        .route("/{product_id}", delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub product_id: ProductId,
}

async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Product>>> {
    Ok(Json(WishlistRepository::new(state.pool()).list(user.id, page).await?))
}

/// Saving an already saved product is a no-op.
async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddRequest>,
) -> Result<StatusCode> {
    WishlistRepository::new(state.pool())
        .add(user.id, body.product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode> {
    WishlistRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
