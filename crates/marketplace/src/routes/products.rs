//! Product catalogue and ratings.

use axum::{Router, extract::State, http::StatusCode, routing::get};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use harvest_market_core::{
    CategoryId, CityId, Page, PageRequest, Price, ProductId, ProductStatus, StateId, StoreId,
    UnitId,
};

use crate::db::products::{ProductFilter, ProductInput, ProductSort};
use crate::db::{ProductRepository, RatingRepository, ReferenceRepository, StoreRepository};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::{OptionalAuth, RequireAuth, RequireSeller};
use crate::models::{CurrentUser, Product, Rating};
use crate::routes::{ensure_owner_or_admin, found};
use crate::state::AppState;
use crate::validation;

const MAX_NAME_LENGTH: usize = 200;
const MAX_DESCRIPTION_LENGTH: usize = 5000;
const MAX_IMAGES: usize = 10;
const MAX_REVIEW_LENGTH: usize = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(index).post(create))
        .route("/products/{id}", get(show).put(update).delete(destroy))
        .route(
            "/products/{id}/ratings",
            get(ratings).post(rate).delete(unrate),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category_id: Option<CategoryId>,
    pub store_id: Option<StoreId>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub category_id: CategoryId,
    pub unit_id: UnitId,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub quantity: i32,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub status: Option<ProductStatus>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub score: i16,
    pub review: Option<String>,
}

/// Validate a product body.
///
/// `is_featured` is only honoured for admins; everyone else keeps `featured`.
fn product_input(body: ProductRequest, user: &CurrentUser, featured: bool) -> Result<ProductInput> {
    if body.quantity < 0 {
        return Err(AppError::BadRequest("quantity cannot be negative".to_string()));
    }

    let is_featured = if user.is_admin() {
        body.is_featured.unwrap_or(featured)
    } else {
        featured
    };

    Ok(ProductInput {
        category_id: body.category_id,
        unit_id: body.unit_id,
        name: validation::required_text("name", &body.name, MAX_NAME_LENGTH)?,
        description: validation::optional_text(
            "description",
            body.description.as_deref(),
            MAX_DESCRIPTION_LENGTH,
        )?,
        price: body.price,
        quantity: body.quantity,
        image_urls: validation::image_urls("image_urls", &body.image_urls, MAX_IMAGES)?,
        status: body.status.unwrap_or(ProductStatus::Active),
        is_featured,
    })
}

async fn check_references(state: &AppState, input: &ProductInput) -> Result<()> {
    let reference = ReferenceRepository::new(state.pool());
    if !reference.category_exists(input.category_id).await? {
        return Err(AppError::BadRequest("Unknown category".to_string()));
    }
    if !reference.unit_exists(input.unit_id).await? {
        return Err(AppError::BadRequest("Unknown unit".to_string()));
    }
    Ok(())
}

/// A product as `viewer` may see it: inactive products only show to their
/// owner and admins.
async fn visible_product(
    state: &AppState,
    id: ProductId,
    viewer: Option<&CurrentUser>,
) -> Result<Product> {
    let product = found(ProductRepository::new(state.pool()).get(id).await?, "Product")?;
    let privileged = viewer.is_some_and(|user| user.id == product.owner_id || user.is_admin());
    if product.status != ProductStatus::Active && !privileged {
        return Err(AppError::NotFound("Product not found".to_string()));
    }
    Ok(product)
}

async fn index(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Page<Product>>> {
    if matches!((query.min_price, query.max_price), (Some(min), Some(max)) if min > max) {
        return Err(AppError::BadRequest(
            "min_price cannot exceed max_price".to_string(),
        ));
    }

    let filter = ProductFilter {
        q: query.q.filter(|q| !q.trim().is_empty()),
        category_id: query.category_id,
        store_id: query.store_id,
        state_id: query.state_id,
        city_id: query.city_id,
        min_price: query.min_price,
        max_price: query.max_price,
        sort: query.sort,
    };
    let products = ProductRepository::new(state.pool()).search(&filter, page).await?;
    Ok(Json(products))
}

async fn show(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(visible_product(&state, id, viewer.as_ref()).await?))
}

#[instrument(skip(state, seller, body), fields(user_id = %seller.id))]
async fn create(
    State(state): State<AppState>,
    RequireSeller(seller): RequireSeller,
    Json(body): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    let store = StoreRepository::new(state.pool())
        .get_by_owner(seller.id)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest("Open a store before adding products".to_string())
        })?;

    let input = product_input(body, &seller, false)?;
    check_references(&state, &input).await?;

    let product = ProductRepository::new(state.pool())
        .create(store.id, &input)
        .await?;
    tracing::info!(product_id = %product.id, store_id = %store.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductRequest>,
) -> Result<Json<Product>> {
    let repo = ProductRepository::new(state.pool());
    let existing = found(repo.get(id).await?, "Product")?;
    ensure_owner_or_admin(&user, existing.owner_id)?;

    let input = product_input(body, &user, existing.is_featured)?;
    check_references(&state, &input).await?;

    Ok(Json(repo.update(id, &input).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn destroy(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    let repo = ProductRepository::new(state.pool());
    let existing = found(repo.get(id).await?, "Product")?;
    ensure_owner_or_admin(&user, existing.owner_id)?;

    repo.soft_delete(id).await?;
    tracing::info!(product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn ratings(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Rating>>> {
    found(ProductRepository::new(state.pool()).get(id).await?, "Product")?;
    Ok(Json(RatingRepository::new(state.pool()).list(id, page).await?))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn rate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    Json(body): Json<RatingRequest>,
) -> Result<Json<Rating>> {
    if !(1..=5).contains(&body.score) {
        return Err(AppError::BadRequest("score must be between 1 and 5".to_string()));
    }
    let review = validation::optional_text("review", body.review.as_deref(), MAX_REVIEW_LENGTH)?;

    let product = visible_product(&state, id, Some(&user)).await?;
    if product.owner_id == user.id {
        return Err(AppError::Forbidden(
            "You cannot rate your own product".to_string(),
        ));
    }

    let rating = RatingRepository::new(state.pool())
        .upsert(id, user.id, body.score, review.as_deref())
        .await?;
    Ok(Json(rating))
}

async fn unrate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    RatingRepository::new(state.pool()).delete(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use harvest_market_core::{Email, UserId, UserRole};

    fn user(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(7),
            email: Email::parse("grower@example.com").unwrap(),
            name: "Grower".to_string(),
            role,
        }
    }

    fn body(is_featured: Option<bool>) -> ProductRequest {
        serde_json::from_value(serde_json::json!({
            "category_id": 1,
            "unit_id": 2,
            "name": "  Heirloom tomatoes ",
            "price": "3.50",
            "quantity": 40,
            "is_featured": is_featured,
        }))
        .unwrap()
    }

    #[test]
    fn test_seller_cannot_feature_products() {
        let input = product_input(body(Some(true)), &user(UserRole::Seller), false).unwrap();
        assert!(!input.is_featured);
    }

    #[test]
    fn test_seller_edit_keeps_existing_feature_flag() {
        let input = product_input(body(Some(false)), &user(UserRole::Seller), true).unwrap();
        assert!(input.is_featured);
    }

    #[test]
    fn test_admin_can_feature_products() {
        let input = product_input(body(Some(true)), &user(UserRole::Admin), false).unwrap();
        assert!(input.is_featured);
    }

    #[test]
    fn test_defaults_and_trimming() {
        let input = product_input(body(None), &user(UserRole::Seller), false).unwrap();
        assert_eq!(input.name, "Heirloom tomatoes");
        assert_eq!(input.status, ProductStatus::Active);
        assert!(input.image_urls.is_empty());
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let mut request = body(None);
        request.quantity = -1;
        let err = product_input(request, &user(UserRole::Seller), false).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_too_many_images_rejected() {
        let mut request = body(None);
        request.image_urls = (0..11).map(|i| format!("/uploads/products/{i}.png")).collect();
        assert!(product_input(request, &user(UserRole::Seller), false).is_err());
    }

    #[test]
    fn test_negative_price_rejected_at_deserialization() {
        let result: std::result::Result<ProductRequest, _> =
            serde_json::from_value(serde_json::json!({
                "category_id": 1,
                "unit_id": 2,
                "name": "Eggs",
                "price": "-1",
                "quantity": 1,
            }));
        assert!(result.is_err());
    }
}
