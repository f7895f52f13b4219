//! HTTP route handlers for the passport API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                               - Liveness check
//! GET  /health/ready                         - Readiness check (store ping)
//!
//! # Checkpoints (rate limited)
//! POST /api/checkpoints/{id}/check-in        - Record a check-in
//! POST /api/checkpoints/{id}/partner-code    - Validate a partner code
//!
//! # Checkpoints
//! GET  /api/checkpoints/{id}/reachability    - Sequential unlock state
//! GET  /api/checkpoints/{id}/geofence        - Distance check
//!
//! # Passport
//! GET  /api/routes/{id}                      - Route with checkpoints, stamps, rewards
//! GET  /api/routes/{id}/progress             - Stamp fragment progress
//! GET  /api/passport                         - Caller's passport, totals, vouchers
//! ```
//!
//! Every `/api` route requires the gateway headers, see [`crate::middleware::auth`].

pub mod checkpoints;
pub mod passport;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::middleware::{ClientIpKeyExtractor, RateLimitConfigError, check_in_rate_limiter};
use crate::state::AppState;
use crate::store::PassportStore;

/// Create the rate-limited checkpoint write routes.
///
/// # Errors
///
/// Returns `RateLimitConfigError` if the limiter cannot be built.
pub fn check_in_routes<S: PassportStore>(
    client_ip: ClientIpKeyExtractor,
) -> Result<Router<AppState<S>>, RateLimitConfigError> {
    Ok(Router::new()
        .route("/{id}/check-in", post(checkpoints::check_in::<S>))
        .route(
            "/{id}/partner-code",
            post(checkpoints::validate_partner_code::<S>),
        )
        .layer(check_in_rate_limiter(client_ip)?))
}

/// Create the read-only checkpoint routes.
pub fn checkpoint_routes<S: PassportStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/{id}/reachability", get(checkpoints::reachability::<S>))
        .route("/{id}/geofence", get(checkpoints::geofence::<S>))
}

/// Create all API routes.
///
/// # Errors
///
/// Returns `RateLimitConfigError` if the limiter cannot be built.
pub fn routes<S: PassportStore>(
    client_ip: ClientIpKeyExtractor,
) -> Result<Router<AppState<S>>, RateLimitConfigError> {
    Ok(Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<S>))
        .nest(
            "/api/checkpoints",
            check_in_routes::<S>(client_ip)?.merge(checkpoint_routes::<S>()),
        )
        .route("/api/routes/{id}", get(passport::route_view::<S>))
        .route("/api/routes/{id}/progress", get(passport::route_progress::<S>))
        .route("/api/passport", get(passport::show::<S>)))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness<S: PassportStore>(State(state): State<AppState<S>>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
