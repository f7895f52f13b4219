//! Passport and route progress endpoints.

use axum::{
    Json,
    extract::{Path, State},
};

use tourpass_core::{RouteId, RouteProgress};

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::services::{PassportSummary, RouteView};
use crate::state::AppState;
use crate::store::PassportStore;

/// The caller's passport with totals and vouchers, issued on first access.
///
/// GET /api/passport
///
/// # Errors
///
/// Returns `AppError::Database` on storage failure.
pub async fn show<S: PassportStore>(
    State(state): State<AppState<S>>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<PassportSummary>> {
    let summary = state.service().passport_summary(user_id).await?;
    Ok(Json(summary))
}

/// A route with its checkpoints, the caller's stamps and the rewards on offer.
///
/// GET /api/routes/{id}
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown or inactive routes.
pub async fn route_view<S: PassportStore>(
    State(state): State<AppState<S>>,
    RequireUser(user_id): RequireUser,
    Path(route_id): Path<RouteId>,
) -> Result<Json<RouteView>> {
    let view = state.service().route_view(user_id, route_id).await?;
    Ok(Json(view))
}

/// The caller's stamp fragment progress on a route.
///
/// GET /api/routes/{id}/progress
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown or inactive routes.
pub async fn route_progress<S: PassportStore>(
    State(state): State<AppState<S>>,
    RequireUser(user_id): RequireUser,
    Path(route_id): Path<RouteId>,
) -> Result<Json<RouteProgress>> {
    let progress = state.service().route_progress(user_id, route_id).await?;
    Ok(Json(progress))
}
