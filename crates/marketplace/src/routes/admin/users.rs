//! Account moderation.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, patch},
};
use serde::Deserialize;
use tracing::instrument;

use harvest_market_core::{Page, PageRequest, UserId, UserRole, UserStatus};

use crate::db::UserRepository;
use crate::db::users::UserFilter;
use crate::error::{AppError, Result};
use crate::extract::{Json, Path, Query};
use crate::middleware::RequireAdmin;
use crate::models::{CurrentUser, User};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(index))
        .route("/users/{id}/status", patch(set_status))
        .route("/users/{id}/role", patch(set_role))
        .route("/users/{id}", delete(destroy))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: UserStatus,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

/// What an admin is about to do to an account.
#[derive(Debug, Clone, Copy)]
enum UserChange {
    Status(UserStatus),
    Role(UserRole),
    Delete,
}

/// An admin may not lock themselves out: no self-block, self-demotion or
/// self-deletion.
fn check_self_change(admin: &CurrentUser, target: UserId, change: UserChange) -> Result<()> {
    if admin.id != target {
        return Ok(());
    }
    let refused = match change {
        UserChange::Status(status) => status == UserStatus::Blocked,
        UserChange::Role(role) => role != UserRole::Admin,
        UserChange::Delete => true,
    };
    if refused {
        return Err(AppError::BadRequest(
            "You cannot block, demote or delete your own account".to_string(),
        ));
    }
    Ok(())
}

async fn index(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Page<User>>> {
    let filter = UserFilter {
        role: query.role,
        status: query.status,
        q: query.q.filter(|q| !q.trim().is_empty()),
    };
    Ok(Json(UserRepository::new(state.pool()).list(&filter, page).await?))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, status = %body.status))]
async fn set_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<User>> {
    check_self_change(&admin, id, UserChange::Status(body.status))?;
    let user = UserRepository::new(state.pool())
        .set_status(id, body.status)
        .await?;
    tracing::info!(user_id = %id, "User status changed");
    Ok(Json(user))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, role = %body.role))]
async fn set_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<User>> {
    check_self_change(&admin, id, UserChange::Role(body.role))?;
    let user = UserRepository::new(state.pool())
        .set_role(id, body.role)
        .await?;
    tracing::info!(user_id = %id, "User role changed");
    Ok(Json(user))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
async fn destroy(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    check_self_change(&admin, id, UserChange::Delete)?;
    UserRepository::new(state.pool()).delete(id).await?;
    tracing::info!(user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use harvest_market_core::Email;

    fn admin() -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("admin@example.com").unwrap(),
            name: "Admin".to_string(),
            role: UserRole::Admin,
        }
    }

    #[test]
    fn test_admin_cannot_block_self() {
        let result = check_self_change(&admin(), UserId::new(1), UserChange::Status(UserStatus::Blocked));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_admin_cannot_demote_self() {
        assert!(check_self_change(&admin(), UserId::new(1), UserChange::Role(UserRole::Seller)).is_err());
        assert!(check_self_change(&admin(), UserId::new(1), UserChange::Role(UserRole::Admin)).is_ok());
    }

    #[test]
    fn test_admin_cannot_delete_self() {
        assert!(check_self_change(&admin(), UserId::new(1), UserChange::Delete).is_err());
    }

    #[test]
    fn test_changes_to_others_allowed() {
        let target = UserId::new(2);
        assert!(check_self_change(&admin(), target, UserChange::Delete).is_ok());
        assert!(check_self_change(&admin(), target, UserChange::Status(UserStatus::Blocked)).is_ok());
        assert!(check_self_change(&admin(), target, UserChange::Role(UserRole::Buyer)).is_ok());
    }

    #[test]
    fn test_reactivating_self_is_harmless() {
        assert!(check_self_change(&admin(), UserId::new(1), UserChange::Status(UserStatus::Active)).is_ok());
    }
}
