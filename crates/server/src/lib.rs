//! Tourpass passport server.
//!
//! JSON API for the digital passport: users check in at route checkpoints,
//! collect stamps and track stamp fragment progress. Check-in decisions are
//! made by `tourpass_core`; this crate loads their inputs, persists stamps and
//! serves the results over HTTP.
//!
//! # Architecture
//!
//! - Axum web framework, generic over a [`store::PassportStore`]
//! - `PostgreSQL` via sqlx in production ([`db::PgPassportStore`])
//! - In-memory store for tests ([`store::MemoryPassportStore`])
//! - Authentication is done by the upstream gateway ([`middleware::auth`])

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{RateLimitConfigError, request_id_middleware};
use crate::state::AppState;
use crate::store::PassportStore;

/// Build the full application router with its middleware stack.
///
/// # Errors
///
/// Returns `RateLimitConfigError` if the check-in rate limiter cannot be built.
pub fn app<S: PassportStore>(state: AppState<S>) -> Result<Router, RateLimitConfigError> {
    Ok(routes::routes::<S>(state.client_ip())?
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
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
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction()))
}
