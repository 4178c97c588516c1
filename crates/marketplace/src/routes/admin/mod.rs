//! Admin console API. Every handler requires [`RequireAdmin`].
//!
//! ```text
//! GET    /api/admin/dashboard
//! GET    /api/admin/users                  ?role&status&q&page&per_page
//! PATCH  /api/admin/users/{id}/status      {status}
//! PATCH  /api/admin/users/{id}/role        {role}
//! DELETE /api/admin/users/{id}
//! POST   /api/admin/{categories|units|states|cities}
//! PUT    /api/admin/{categories|units|states|cities}/{id}
//! DELETE /api/admin/{categories|units|states|cities}/{id}
//! POST   /api/admin/{categories|units|states|cities}/import   multipart `file`
//! POST   /api/admin/communities
//! PUT    /api/admin/communities/{id}
//! DELETE /api/admin/communities/{id}
//! GET    /api/admin/reports                ?status&page
//! PATCH  /api/admin/reports/{id}           {status, resolution_note?}
//! GET    /api/admin/banners
//! POST   /api/admin/banners
//! PUT    /api/admin/banners/{id}
//! DELETE /api/admin/banners/{id}
//! ```
//!
//! [`RequireAdmin`]: crate::middleware::RequireAdmin

pub mod banners;
pub mod dashboard;
pub mod moderation;
pub mod reference;
pub mod users;

use axum::{Router, routing::get};

use crate::state::AppState;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::index))
        .merge(users::router())
        .merge(reference::router(state))
        .merge(moderation::router())
        .merge(banners::router())
}
