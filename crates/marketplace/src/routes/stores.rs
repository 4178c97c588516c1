//! Store directory, store management and following.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use harvest_market_core::{CityId, Page, PageRequest, StateId, StoreId};

use crate::db::{ProductRepository, StoreRepository};
use crate::db::stores::{StoreFilter, StoreInput};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::{OptionalAuth, RequireAuth, RequireSeller};
use crate::models::{Product, Store};
use crate::routes::reference::check_location;
use crate::routes::{ensure_owner_or_admin, found};
use crate::state::AppState;
use crate::validation;

const MAX_NAME_LENGTH: usize = 120;
const MAX_DESCRIPTION_LENGTH: usize = 2000;
const MAX_PHONE_LENGTH: usize = 32;
const MAX_ADDRESS_LENGTH: usize = 300;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stores", get(index).post(create))
        .route("/stores/{id}", get(show).put(update).delete(destroy))
        .route("/stores/{id}/follow", post(follow).delete(unfollow))
        .route("/stores/{id}/products", get(products))
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreQuery {
    pub q: Option<String>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
}

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
}

impl StoreRequest {
    fn validate(self) -> Result<StoreInput> {
        Ok(StoreInput {
            name: validation::required_text("name", &self.name, MAX_NAME_LENGTH)?,
            description: validation::optional_text(
                "description",
                self.description.as_deref(),
                MAX_DESCRIPTION_LENGTH,
            )?,
            logo_url: validation::optional_url("logo_url", self.logo_url.as_deref())?,
            banner_url: validation::optional_url("banner_url", self.banner_url.as_deref())?,
            phone: validation::optional_text("phone", self.phone.as_deref(), MAX_PHONE_LENGTH)?,
            address: validation::optional_text(
                "address",
                self.address.as_deref(),
                MAX_ADDRESS_LENGTH,
            )?,
            state_id: self.state_id,
            city_id: self.city_id,
        })
    }
}

/// Store detail plus whether the viewer follows it.
#[derive(Debug, Serialize)]
pub struct StoreView {
    #[serde(flatten)]
    pub store: Store,
    pub is_following: bool,
}

#[derive(Debug, Serialize)]
pub struct FollowState {
    pub following: bool,
    pub followers_count: i32,
}

async fn index(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(query): Query<StoreQuery>,
) -> Result<Json<Page<Store>>> {
    let filter = StoreFilter {
        q: query.q.filter(|q| !q.trim().is_empty()),
        state_id: query.state_id,
        city_id: query.city_id,
    };
    let stores = StoreRepository::new(state.pool()).list(&filter, page).await?;
    Ok(Json(stores))
}

async fn show(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(id): Path<StoreId>,
) -> Result<Json<StoreView>> {
    let repo = StoreRepository::new(state.pool());
    let store = found(repo.get(id).await?, "Store")?;
    let is_following = match viewer {
        Some(user) => repo.is_following(id, user.id).await?,
        None => false,
    };
    Ok(Json(StoreView {
        store,
        is_following,
    }))
}

#[instrument(skip(state, seller, body), fields(user_id = %seller.id))]
async fn create(
    State(state): State<AppState>,
    RequireSeller(seller): RequireSeller,
    Json(body): Json<StoreRequest>,
) -> Result<(StatusCode, Json<Store>)> {
    let input = body.validate()?;
    check_location(state.pool(), input.state_id, input.city_id).await?;

    let store = StoreRepository::new(state.pool())
        .create(seller.id, &input)
        .await?;
    tracing::info!(store_id = %store.id, "Store opened");
    Ok((StatusCode::CREATED, Json(store)))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<StoreId>,
    Json(body): Json<StoreRequest>,
) -> Result<Json<Store>> {
    let repo = StoreRepository::new(state.pool());
    let store = found(repo.get(id).await?, "Store")?;
    ensure_owner_or_admin(&user, store.owner_id)?;

    let input = body.validate()?;
    check_location(state.pool(), input.state_id, input.city_id).await?;

    Ok(Json(repo.update(id, &input).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn destroy(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<StoreId>,
) -> Result<StatusCode> {
    let repo = StoreRepository::new(state.pool());
    let store = found(repo.get(id).await?, "Store")?;
    ensure_owner_or_admin(&user, store.owner_id)?;

    repo.delete(id).await?;
    tracing::info!(store_id = %id, "Store deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn follow(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<StoreId>,
) -> Result<Json<FollowState>> {
    let repo = StoreRepository::new(state.pool());
    let store = found(repo.get(id).await?, "Store")?;
    if store.owner_id == user.id {
        return Err(AppError::BadRequest(
            "You cannot follow your own store".to_string(),
        ));
    }

    let followers_count = repo.follow(&store, user.id, &user.name).await?;
    Ok(Json(FollowState {
        following: true,
        followers_count,
    }))
}

async fn unfollow(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<StoreId>,
) -> Result<Json<FollowState>> {
    let repo = StoreRepository::new(state.pool());
    found(repo.get(id).await?, "Store")?;

    let followers_count = repo.unfollow(id, user.id).await?;
    Ok(Json(FollowState {
        following: false,
        followers_count,
    }))
}

async fn products(
    State(state): State<AppState>,
    Path(id): Path<StoreId>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Product>>> {
    found(StoreRepository::new(state.pool()).get(id).await?, "Store")?;
    let products = ProductRepository::new(state.pool())
        .list_for_store(id, false, page)
        .await?;
    Ok(Json(products))
}
