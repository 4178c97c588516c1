//! Homepage banners.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;

use harvest_market_core::BannerId;

use crate::db::BannerRepository;
use crate::db::banners::BannerInput;
use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::RequireAdmin;
use crate::models::Banner;
use crate::state::AppState;
use crate::validation::{self, ValidationError};

const MAX_TITLE_LENGTH: usize = 120;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/banners", get(index).post(create))
        .route("/banners/{id}", put(update).delete(destroy))
}

const fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct BannerRequest {
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl BannerRequest {
    fn into_input(self) -> std::result::Result<BannerInput, ValidationError> {
        if self.position < 0 {
            return Err(ValidationError::new("position must not be negative"));
        }
        Ok(BannerInput {
            title: validation::required_text("title", &self.title, MAX_TITLE_LENGTH)?,
            image_url: validation::url("image_url", &self.image_url)?,
            link_url: validation::optional_url("link_url", self.link_url.as_deref())?,
            position: self.position,
            is_active: self.is_active,
        })
    }
}

/// Active banners in display order. Public.
pub async fn public_list(State(state): State<AppState>) -> Result<Json<Vec<Banner>>> {
    Ok(Json(BannerRepository::new(state.pool()).list(false).await?))
}

async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Banner>>> {
    Ok(Json(BannerRepository::new(state.pool()).list(true).await?))
}

async fn create(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<BannerRequest>,
) -> Result<(StatusCode, Json<Banner>)> {
    let input = body.into_input()?;
    let banner = BannerRepository::new(state.pool()).create(&input).await?;
    Ok((StatusCode::CREATED, Json(banner)))
}

async fn update(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<BannerId>,
    Json(body): Json<BannerRequest>,
) -> Result<Json<Banner>> {
    let input = body.into_input()?;
    Ok(Json(
        BannerRepository::new(state.pool())
            .update(id, &input)
            .await?,
    ))
}

async fn destroy(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<BannerId>,
) -> Result<StatusCode> {
    BannerRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> BannerRequest {
        BannerRequest {
            title: "Harvest week".to_string(),
            image_url: "https://cdn.example.com/banner.jpg".to_string(),
            link_url: None,
            position: 0,
            is_active: true,
        }
    }

    #[test]
    fn test_banner_defaults_from_json() {
        let body: BannerRequest = serde_json::from_str(
            r#"{"title":"Sale","image_url":"/uploads/banners/x.png"}"#,
        )
        .unwrap();
        assert_eq!(body.position, 0);
        assert!(body.is_active);
    }

    #[test]
    fn test_banner_requires_image_url() {
        let mut body = request();
        body.image_url = "  ".to_string();
        assert!(body.into_input().is_err());
    }

    #[test]
    fn test_banner_rejects_negative_position() {
        let mut body = request();
        body.position = -1;
        assert!(body.into_input().is_err());
    }

    #[test]
    fn test_banner_valid() {
        let input = request().into_input().unwrap();
        assert_eq!(input.title, "Harvest week");
        assert!(input.is_active);
    }
}
