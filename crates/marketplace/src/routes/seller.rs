//! Seller dashboard.

use axum::{Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use harvest_market_core::{BookingStatus, Page, PageRequest};

use crate::db::stats::SellerStats;
use crate::db::{BookingRepository, ProductRepository, StatsRepository, StoreRepository};
use crate::error::Result;
use crate::extract::{Json, Query};
use crate::middleware::RequireSeller;
use crate::models::{Booking, Product, Store};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/products", get(products))
        .route("/bookings", get(bookings))
}

#[derive(Debug, Serialize)]
pub struct SellerDashboard {
    pub store: Option<Store>,
    #[serde(flatten)]
    pub stats: SellerStats,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingQuery {
    pub status: Option<BookingStatus>,
}

async fn dashboard(
    State(state): State<AppState>,
    RequireSeller(seller): RequireSeller,
) -> Result<Json<SellerDashboard>> {
    let store = StoreRepository::new(state.pool())
        .get_by_owner(seller.id)
        .await?;
    let stats = StatsRepository::new(state.pool()).seller(seller.id).await?;
    Ok(Json(SellerDashboard { store, stats }))
}

/// The seller's own products, including inactive ones. Empty without a store.
async fn products(
    State(state): State<AppState>,
    RequireSeller(seller): RequireSeller,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Product>>> {
    let Some(store) = StoreRepository::new(state.pool())
        .get_by_owner(seller.id)
        .await?
    else {
        return Ok(Json(Page::new(Vec::new(), 0, page)));
    };

    let products = ProductRepository::new(state.pool())
        .list_for_store(store.id, true, page)
        .await?;
    Ok(Json(products))
}

async fn bookings(
    State(state): State<AppState>,
    RequireSeller(seller): RequireSeller,
    Query(page): Query<PageRequest>,
    Query(query): Query<BookingQuery>,
) -> Result<Json<Page<Booking>>> {
    let bookings = BookingRepository::new(state.pool())
        .list_for_owner(seller.id, query.status, page)
        .await?;
    Ok(Json(bookings))
}
