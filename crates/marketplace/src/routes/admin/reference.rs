//! Reference data maintenance and CSV import.
//!
//! Every write drops the cached reference lists.

use axum::{
    Router,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    routing::{post, put},
};
use serde::Deserialize;
use tracing::instrument;

use harvest_market_core::{CategoryId, CityId, StateId, UnitId};

use crate::db::ReferenceRepository;
use crate::db::reference::{CategoryInput, CityInput, StateInput, UnitInput};
use crate::error::{AppError, Result};
use crate::extract::{Json, Path};
use crate::middleware::RequireAdmin;
use crate::models::{Category, City, State as Region, Unit};
use crate::routes::uploads::{body_limit, read_form};
use crate::services::import::{
    ImportKind, ImportReport, Importer, MAX_ABBREVIATION, MAX_DESCRIPTION, MAX_NAME,
    MAX_STATE_CODE,
};
use crate::services::media::MediaError;
use crate::state::AppState;
use crate::validation::{self, ValidationError};

const IMPORT_KINDS: [ImportKind; 4] = [
    ImportKind::Categories,
    ImportKind::Units,
    ImportKind::States,
    ImportKind::Cities,
];

pub fn router(state: &AppState) -> Router<AppState> {
    let mut imports = Router::new();
    for kind in IMPORT_KINDS {
        imports = imports.route(
            &format!("/{}/import", kind.as_str()),
            post(
                move |admin: RequireAdmin,
                      state: State<AppState>,
                      multipart: std::result::Result<Multipart, MultipartRejection>| {
                    import(kind, admin, state, multipart)
                },
            ),
        );
    }

    Router::new()
        .route("/categories", post(create_category))
        .route("/categories/{id}", put(update_category).delete(delete_category))
        .route("/units", post(create_unit))
        .route("/units/{id}", put(update_unit).delete(delete_unit))
        .route("/states", post(create_state))
        .route("/states/{id}", put(update_state).delete(delete_state))
        .route("/cities", post(create_city))
        .route("/cities/{id}", put(update_city).delete(delete_city))
        .merge(imports.layer(body_limit(state)))
}

// -- Request bodies ---------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    /// Derived from the name when absent.
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl CategoryRequest {
    fn into_input(self) -> std::result::Result<CategoryInput, ValidationError> {
        let name = validation::required_text("name", &self.name, MAX_NAME)?;
        let slug = validation::slugify(self.slug.as_deref().unwrap_or(&name));
        if slug.is_empty() {
            return Err(ValidationError::new("slug must contain letters or digits"));
        }
        Ok(CategoryInput {
            slug,
            description: validation::optional_text(
                "description",
                self.description.as_deref(),
                MAX_DESCRIPTION,
            )?,
            image_url: validation::optional_url("image_url", self.image_url.as_deref())?,
            name,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UnitRequest {
    pub name: String,
    pub abbreviation: String,
}

impl UnitRequest {
    fn into_input(self) -> std::result::Result<UnitInput, ValidationError> {
        Ok(UnitInput {
            name: validation::required_text("name", &self.name, MAX_NAME)?,
            abbreviation: validation::required_text(
                "abbreviation",
                &self.abbreviation,
                MAX_ABBREVIATION,
            )?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StateRequest {
    pub name: String,
    pub code: Option<String>,
}

impl StateRequest {
    fn into_input(self) -> std::result::Result<StateInput, ValidationError> {
        Ok(StateInput {
            name: validation::required_text("name", &self.name, MAX_NAME)?,
            code: validation::optional_text("code", self.code.as_deref(), MAX_STATE_CODE)?
                .map(|code| code.to_uppercase()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CityRequest {
    pub state_id: StateId,
    pub name: String,
}

// -- Handlers ---------------------------------------------------------------

async fn create_category(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let input = body.into_input()?;
    let category = ReferenceRepository::new(state.pool())
        .create_category(&input)
        .await?;
    state.reference_cache().invalidate().await;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<Category>> {
    let input = body.into_input()?;
    let category = ReferenceRepository::new(state.pool())
        .update_category(id, &input)
        .await?;
    state.reference_cache().invalidate().await;
    Ok(Json(category))
}

async fn delete_category(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    ReferenceRepository::new(state.pool())
        .delete_category(id)
        .await?;
    state.reference_cache().invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_unit(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<UnitRequest>,
) -> Result<(StatusCode, Json<Unit>)> {
    let input = body.into_input()?;
    let unit = ReferenceRepository::new(state.pool()).create_unit(&input).await?;
    state.reference_cache().invalidate().await;
    Ok((StatusCode::CREATED, Json(unit)))
}

async fn update_unit(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UnitId>,
    Json(body): Json<UnitRequest>,
) -> Result<Json<Unit>> {
    let input = body.into_input()?;
    let unit = ReferenceRepository::new(state.pool())
        .update_unit(id, &input)
        .await?;
    state.reference_cache().invalidate().await;
    Ok(Json(unit))
}

async fn delete_unit(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UnitId>,
) -> Result<StatusCode> {
    ReferenceRepository::new(state.pool()).delete_unit(id).await?;
    state.reference_cache().invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_state(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<StateRequest>,
) -> Result<(StatusCode, Json<Region>)> {
    let input = body.into_input()?;
    let region = ReferenceRepository::new(state.pool())
        .create_state(&input)
        .await?;
    state.reference_cache().invalidate().await;
    Ok((StatusCode::CREATED, Json(region)))
}

async fn update_state(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<StateId>,
    Json(body): Json<StateRequest>,
) -> Result<Json<Region>> {
    let input = body.into_input()?;
    let region = ReferenceRepository::new(state.pool())
        .update_state(id, &input)
        .await?;
    state.reference_cache().invalidate().await;
    Ok(Json(region))
}

/// Deletes the state together with its cities.
async fn delete_state(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<StateId>,
) -> Result<StatusCode> {
    ReferenceRepository::new(state.pool()).delete_state(id).await?;
    state.reference_cache().invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}

async fn city_input(state: &AppState, body: CityRequest) -> Result<CityInput> {
    let name = validation::required_text("name", &body.name, MAX_NAME)?;
    if ReferenceRepository::new(state.pool())
        .get_state(body.state_id)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest("Unknown state".to_string()));
    }
    Ok(CityInput {
        state_id: body.state_id,
        name,
    })
}

async fn create_city(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<CityRequest>,
) -> Result<(StatusCode, Json<City>)> {
    let input = city_input(&state, body).await?;
    let city = ReferenceRepository::new(state.pool()).create_city(&input).await?;
    state.reference_cache().invalidate().await;
    Ok((StatusCode::CREATED, Json(city)))
}

async fn update_city(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CityId>,
    Json(body): Json<CityRequest>,
) -> Result<Json<City>> {
    let input = city_input(&state, body).await?;
    let city = ReferenceRepository::new(state.pool())
        .update_city(id, &input)
        .await?;
    state.reference_cache().invalidate().await;
    Ok(Json(city))
}

async fn delete_city(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CityId>,
) -> Result<StatusCode> {
    ReferenceRepository::new(state.pool()).delete_city(id).await?;
    state.reference_cache().invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}

/// Import a CSV file uploaded as the `file` field.
#[instrument(skip(state, admin, multipart), fields(admin_id = %admin.id, kind = kind.as_str()))]
async fn import(
    kind: ImportKind,
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ImportReport>> {
    let form = read_form(multipart, state.media().max_bytes()).await?;
    let file = form.file.ok_or(MediaError::MissingFile)?;

    let report = Importer::new(state.pool()).import(kind, &file.bytes).await?;
    state.reference_cache().invalidate().await;

    tracing::info!(
        inserted = report.inserted,
        skipped = report.skipped.len(),
        errors = report.errors.len(),
        "Reference import finished"
    );
    Ok(Json(report))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_category_slug_from_name() {
        let input = CategoryRequest {
            name: "  Fresh Fruits ".to_string(),
            slug: None,
            description: Some("   ".to_string()),
            image_url: None,
        }
        .into_input()
        .unwrap();
        assert_eq!(input.name, "Fresh Fruits");
        assert_eq!(input.slug, "fresh-fruits");
        assert_eq!(input.description, None);
    }

    #[test]
    fn test_category_explicit_slug_is_normalized() {
        let input = CategoryRequest {
            name: "Fruits".to_string(),
            slug: Some("Tropical Fruit!".to_string()),
            description: None,
            image_url: None,
        }
        .into_input()
        .unwrap();
        assert_eq!(input.slug, "tropical-fruit");
    }

    #[test]
    fn test_category_rejects_symbol_only_slug() {
        let result = CategoryRequest {
            name: "Fruits".to_string(),
            slug: Some("!!!".to_string()),
            description: None,
            image_url: None,
        }
        .into_input();
        assert!(result.is_err());
    }

    #[test]
    fn test_state_code_uppercased() {
        let input = StateRequest {
            name: "Lagos".to_string(),
            code: Some("la".to_string()),
        }
        .into_input()
        .unwrap();
        assert_eq!(input.code.as_deref(), Some("LA"));
    }

    #[test]
    fn test_unit_requires_abbreviation() {
        let result = UnitRequest {
            name: "Kilogram".to_string(),
            abbreviation: " ".to_string(),
        }
        .into_input();
        assert!(result.is_err());
    }
}
