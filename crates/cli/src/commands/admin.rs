//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! HM_ADMIN_PASSWORD='correct horse battery' \
//!     hm-cli admin create -e admin@example.com -n "Admin Name"
//! ```
//!
//! An existing account with the same email is promoted to admin and gets the
//! new password.

use harvest_market::services::auth::{AuthError, AuthService};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Password variable is missing.
    #[error("Missing environment variable: HM_ADMIN_PASSWORD")]
    MissingPassword,

    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Validation or database failure.
    #[error("{0}")]
    Auth(#[from] AuthError),
}

/// Create an admin user or promote an existing one.
///
/// # Returns
///
/// The ID of the admin user.
pub async fn create_user(email: &str, name: &str) -> Result<i32, AdminError> {
    dotenvy::dotenv().ok();

    let password = std::env::var("HM_ADMIN_PASSWORD")
        .ok()
        .filter(|p| !p.is_empty())
        .ok_or(AdminError::MissingPassword)?;

    let pool = connect().await?;

    tracing::info!("Creating admin user: {}", email);
    let user = AuthService::new(&pool, None)
        .create_admin(name, email, &password)
        .await?;

    tracing::info!(
        "Admin user ready! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );

    Ok(user.id.as_i32())
}
