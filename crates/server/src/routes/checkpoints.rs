//! Checkpoint endpoints: check-in, partner code, reachability, geofence.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use tourpass_core::{CheckpointId, GeoPoint, GeofenceValidation, Reachability};

use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::services::{CheckInAttempt, CheckInReceipt};
use crate::state::AppState;
use crate::store::PassportStore;

/// Request body for a check-in.
#[derive(Debug, Default, Deserialize)]
pub struct CheckInBody {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub code: Option<String>,
    pub photo_url: Option<String>,
}

/// Request body for partner code validation.
#[derive(Debug, Deserialize)]
pub struct PartnerCodeBody {
    pub code: String,
}

/// Points a valid partner code is worth.
#[derive(Debug, Serialize)]
pub struct PartnerCodeResponse {
    pub points: i32,
}

/// Query string for the geofence check.
#[derive(Debug, Deserialize)]
pub struct GeofenceQuery {
    pub latitude: f64,
    pub longitude: f64,
}

/// Record a check-in.
///
/// POST /api/checkpoints/{id}/check-in
///
/// # Errors
///
/// Returns `AppError::CheckIn` when the attempt is rejected.
pub async fn check_in<S: PassportStore>(
    State(state): State<AppState<S>>,
    RequireUser(user_id): RequireUser,
    Path(checkpoint_id): Path<CheckpointId>,
    Json(body): Json<CheckInBody>,
) -> Result<(StatusCode, Json<CheckInReceipt>)> {
    let attempt = CheckInAttempt {
        location: parse_location(body.latitude, body.longitude)?,
        code: body.code,
        photo_url: body.photo_url,
    };

    let receipt = state
        .service()
        .attempt_check_in(user_id, checkpoint_id, &attempt)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Validate a partner code without stamping.
///
/// POST /api/checkpoints/{id}/partner-code
///
/// # Errors
///
/// Returns `AppError::CheckIn` for a missing, wrong or already used code.
pub async fn validate_partner_code<S: PassportStore>(
    State(state): State<AppState<S>>,
    RequireUser(user_id): RequireUser,
    Path(checkpoint_id): Path<CheckpointId>,
    Json(body): Json<PartnerCodeBody>,
) -> Result<Json<PartnerCodeResponse>> {
    let points = state
        .service()
        .validate_partner_code(user_id, checkpoint_id, &body.code)
        .await?;
    Ok(Json(PartnerCodeResponse { points }))
}

/// Whether the checkpoint is unlocked for the caller.
///
/// GET /api/checkpoints/{id}/reachability
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown checkpoint.
pub async fn reachability<S: PassportStore>(
    State(state): State<AppState<S>>,
    RequireUser(user_id): RequireUser,
    Path(checkpoint_id): Path<CheckpointId>,
) -> Result<Json<Reachability>> {
    let reachability = state
        .service()
        .reachability(user_id, checkpoint_id)
        .await?;
    Ok(Json(reachability))
}

/// Distance from a position to the checkpoint's geofence.
///
/// GET /api/checkpoints/{id}/geofence?latitude=&longitude=
///
/// # Errors
///
/// Returns `AppError::BadRequest` for invalid coordinates.
pub async fn geofence<S: PassportStore>(
    State(state): State<AppState<S>>,
    RequireUser(_user_id): RequireUser,
    Path(checkpoint_id): Path<CheckpointId>,
    Query(query): Query<GeofenceQuery>,
) -> Result<Json<GeofenceValidation>> {
    let location = GeoPoint::new(query.latitude, query.longitude)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let validation = state.service().geofence(checkpoint_id, &location).await?;
    Ok(Json(validation))
}

fn parse_location(latitude: Option<f64>, longitude: Option<f64>) -> Result<Option<GeoPoint>> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => GeoPoint::new(lat, lon)
            .map(Some)
            .map_err(|e| AppError::BadRequest(e.to_string())),
        (None, None) => Ok(None),
        _ => Err(AppError::BadRequest(
            "latitude and longitude must be sent together".to_owned(),
        )),
    }
}
