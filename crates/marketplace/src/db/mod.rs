//! Database operations for the marketplace `PostgreSQL` database.
//!
//! Everything lives in the `market` schema.
//!
//! ## Tables
//!
//! - `user`, `user_password`, `password_reset` - Accounts and credentials
//! - `session` - Tower-sessions storage
//! - `state`, `city`, `category`, `unit` - Reference data
//! - `store`, `store_follower`, `product`, `rating`, `wishlist_item` - Catalogue
//! - `vehicle`, `booking` - Equipment rentals
//! - `community`, `community_member`, `community_post`, `community_comment`,
//!   `community_like` - Community groups
//! - `conversation`, `conversation_participant`, `message` - Direct messages
//! - `notification`, `report`, `banner`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/marketplace/migrations/` and run via:
//! ```bash
//! cargo run -p harvest-market-cli -- migrate
//! ```
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate builds
//! without a live database.

pub mod banners;
pub mod bookings;
pub mod communities;
pub mod conversations;
pub mod notifications;
pub mod password_resets;
pub mod posts;
pub mod products;
pub mod ratings;
pub mod reference;
pub mod reports;
pub mod stats;
pub mod stores;
pub mod users;
pub mod vehicles;
pub mod wishlist;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use banners::BannerRepository;
pub use bookings::BookingRepository;
pub use communities::CommunityRepository;
pub use conversations::ConversationRepository;
pub use notifications::NotificationRepository;
pub use password_resets::PasswordResetRepository;
pub use posts::PostRepository;
pub use products::ProductRepository;
pub use ratings::RatingRepository;
pub use reference::ReferenceRepository;
pub use reports::ReportRepository;
pub use stats::StatsRepository;
pub use stores::StoreRepository;
pub use users::UserRepository;
pub use vehicles::VehicleRepository;
pub use wishlist::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A referenced row (category, unit, state...) does not exist.
    #[error("invalid reference: {0}")]
    InvalidReference(String),
}

impl RepositoryError {
    /// Classify an error from an `INSERT` or `UPDATE`.
    ///
    /// Unique violations become [`Self::Conflict`] with `conflict` as the
    /// message, foreign key violations become [`Self::InvalidReference`].
    pub(crate) fn from_write(err: sqlx::Error, conflict: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Self::Conflict(conflict.to_owned());
            }
            if db_err.is_foreign_key_violation() {
                let constraint = db_err.constraint().unwrap_or("foreign key");
                return Self::InvalidReference(format!("referenced row does not exist ({constraint})"));
            }
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Escape `%`, `_` and `\` so user input matches literally inside `ILIKE`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}
