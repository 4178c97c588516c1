//! HTTP route handlers for the marketplace API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /api/auth/register             - Create account and sign in
//! POST   /api/auth/login                - Sign in
//! POST   /api/auth/logout               - Sign out
//! GET    /api/auth/me                   - Current account
//! PUT    /api/auth/me                   - Update profile
//! PUT    /api/auth/password             - Change password
//! POST   /api/auth/password/forgot      - Email a reset code
//! POST   /api/auth/password/reset       - Reset password with a code
//!
//! # Catalogue
//! GET    /api/stores                    - Store directory
//! POST   /api/stores                    - Open a store (seller)
//! GET    /api/stores/{id}               - Store detail
//! PUT    /api/stores/{id}               - Edit store (owner/admin)
//! DELETE /api/stores/{id}               - Close store (owner/admin)
//! POST   /api/stores/{id}/follow        - Follow
//! DELETE /api/stores/{id}/follow        - Unfollow
//! GET    /api/stores/{id}/products      - Store products
//! GET    /api/products                  - Product search
//! POST   /api/products                  - Create product (seller)
//! GET    /api/products/{id}             - Product detail
//! PUT    /api/products/{id}             - Edit product (owner/admin)
//! DELETE /api/products/{id}             - Soft delete (owner/admin)
//! GET    /api/products/{id}/ratings     - Ratings
//! POST   /api/products/{id}/ratings     - Rate (upsert)
//! DELETE /api/products/{id}/ratings     - Remove own rating
//!
//! # Rentals
//! GET    /api/vehicles                  - Vehicle search
//! POST   /api/vehicles                  - List a vehicle (seller)
//! GET    /api/vehicles/{id}             - Vehicle detail
//! PUT    /api/vehicles/{id}             - Edit vehicle (owner/admin)
//! DELETE /api/vehicles/{id}             - Soft delete (owner/admin)
//! GET    /api/bookings                  - My bookings as renter
//! POST   /api/bookings                  - Request a booking
//! GET    /api/bookings/{id}             - Booking detail
//! PATCH  /api/bookings/{id}/status      - Move a booking along
//!
//! # Seller
//! GET    /api/seller/dashboard          - Seller stats
//! GET    /api/seller/products           - Own products incl. inactive
//! GET    /api/seller/bookings           - Bookings on own vehicles
//!
//! # Reference data (cached)
//! GET    /api/categories | /api/units | /api/states | /api/states/{id}/cities
//!
//! # Community
//! GET    /api/communities               - Communities
//! GET    /api/communities/{id}          - Community detail
//! POST   /api/communities/{id}/membership - Join
//! DELETE /api/communities/{id}/membership - Leave
//! GET    /api/communities/{id}/posts    - Community posts
//! POST   /api/communities/{id}/posts    - Post (members)
//! GET    /api/feed                      - All posts
//! GET    /api/posts/{id}                - Post detail
//! PUT    /api/posts/{id}                - Edit (author)
//! DELETE /api/posts/{id}                - Delete (author/admin)
//! GET    /api/posts/{id}/comments       - Comments
//! POST   /api/posts/{id}/comments       - Comment
//! DELETE /api/comments/{id}             - Delete comment (author/admin)
//! POST   /api/posts/{id}/like           - Like
//! DELETE /api/posts/{id}/like           - Unlike
//!
//! # Messaging, notifications, wishlist, reports, banners, uploads
//! GET    /api/conversations             - Inbox
//! POST   /api/conversations             - Find or start a conversation
//! GET    /api/conversations/unread      - Unread total
//! GET    /api/conversations/{id}/messages - Messages (marks read)
//! POST   /api/conversations/{id}/messages - Send
//! POST   /api/conversations/{id}/read   - Mark read
//! GET    /api/notifications             - Notifications
//! GET    /api/notifications/unread-count
//! PATCH  /api/notifications/{id}/read
//! POST   /api/notifications/read-all
//! DELETE /api/notifications/{id}
//! GET    /api/wishlist | POST /api/wishlist | DELETE /api/wishlist/{product_id}
//! POST   /api/reports                   - Report content
//! GET    /api/banners                   - Active banners
//! POST   /api/uploads                   - Image upload (multipart)
//!
//! # Admin (see `admin` module)
//! /api/admin/*
//! ```

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod community;
pub mod conversations;
pub mod health;
pub mod notifications;
pub mod products;
pub mod reference;
pub mod reports;
pub mod seller;
pub mod stores;
pub mod uploads;
pub mod vehicles;
pub mod wishlist;

use axum::Router;

use harvest_market_core::UserId;

use crate::error::AppError;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Create all `/api` routes.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .merge(stores::router())
        .merge(products::router())
        .merge(vehicles::router())
        .merge(bookings::router())
        .nest("/seller", seller::router())
        .merge(reference::router())
        .merge(community::router())
        .merge(conversations::router())
        .nest("/notifications", notifications::router())
        .nest("/wishlist", wishlist::router())
        .nest("/reports", reports::router())
        .route("/banners", axum::routing::get(admin::banners::public_list))
        .nest("/uploads", uploads::router(state))
        .nest("/admin", admin::router(state))
}

/// Allow the resource owner or an admin; everyone else gets 403.
pub(crate) fn ensure_owner_or_admin(
    user: &CurrentUser,
    owner_id: UserId,
) -> Result<(), AppError> {
    if user.id == owner_id || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to modify this resource".to_string(),
        ))
    }
}

/// `Option` lookup result to a 404 with a resource-specific message.
pub(crate) fn found<T>(value: Option<T>, what: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::NotFound(format!("{what} not found")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use harvest_market_core::{Email, UserRole};

    fn user(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse("someone@example.com").unwrap(),
            name: "Someone".to_string(),
            role,
        }
    }

    #[test]
    fn test_owner_may_modify() {
        assert!(ensure_owner_or_admin(&user(4, UserRole::Seller), UserId::new(4)).is_ok());
    }

    #[test]
    fn test_admin_may_modify_anything() {
        assert!(ensure_owner_or_admin(&user(1, UserRole::Admin), UserId::new(4)).is_ok());
    }

    #[test]
    fn test_other_seller_is_forbidden() {
        let err = ensure_owner_or_admin(&user(5, UserRole::Seller), UserId::new(4)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_found_maps_none_to_not_found() {
        let err = found::<i32>(None, "Store").unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg == "Store not found"));
        assert_eq!(found(Some(3), "Store").unwrap(), 3);
    }
}
