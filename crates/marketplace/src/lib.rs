//! Harvest Market HTTP API library.
//!
//! Produce listings, vehicle rentals, messaging, community groups and the
//! admin console, served as JSON under `/api`. The binary in `main.rs` only
//! loads configuration, initializes tracing and Sentry, and serves [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;

use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::config::UploadBackend;
use crate::middleware::session::SessionStoreError;
use crate::services::media::LOCAL_PUBLIC_PREFIX;
use crate::state::AppState;

/// Build the complete application router.
///
/// Layer order, outermost first: Sentry, tracing, request id, security
/// headers, session.
///
/// # Errors
///
/// Returns an error if the session store cannot be configured.
pub fn app(state: AppState) -> Result<Router, SessionStoreError> {
    let session_layer = middleware::create_session_layer(state.pool(), state.config())?;

    let mut router = Router::new()
        .merge(routes::health::router())
        .nest("/api", routes::routes(&state));

    if let UploadBackend::Local { dir } = &state.config().uploads.backend {
        router = router.nest_service(LOCAL_PUBLIC_PREFIX, ServeDir::new(dir));
    }

    let mut router = router
        .layer(session_layer)
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ));

    if state.config().is_https() {
        router = router.layer(axum::middleware::from_fn(middleware::hsts_middleware));
    }

    Ok(router
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction()))
}
