//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::ReferenceCache;
use crate::config::MarketConfig;
use crate::services::email::EmailService;
use crate::services::media::MediaService;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("SMTP configuration error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: MarketConfig,
    pool: PgPool,
    media: MediaService,
    email: Option<EmailService>,
    reference_cache: ReferenceCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport or HTTP client cannot be built.
    pub fn new(config: MarketConfig, pool: PgPool) -> Result<Self, StateError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let media = MediaService::from_config(&config.uploads, http);

        let email = match &config.email {
            Some(email_config) => Some(EmailService::new(email_config, &config.base_url)?),
            None => {
                tracing::warn!("SMTP is not configured; password reset emails are disabled");
                None
            }
        };

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                media,
                email,
                reference_cache: ReferenceCache::new(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &MarketConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Upload validation and storage.
    #[must_use]
    pub fn media(&self) -> &MediaService {
        &self.inner.media
    }

    /// Email service, if SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    #[must_use]
    pub fn reference_cache(&self) -> &ReferenceCache {
        &self.inner.reference_cache
    }
}
