//! Check-in evaluation.
//!
//! [`evaluate_check_in`] decides whether a single attempt may succeed:
//!
//! 1. Sequential lock (only when the route requires it)
//! 2. Duplicate stamp
//! 3. Validation mode: geofence, partner code, or mixed
//! 4. Required photo
//!
//! The caller persists the stamp. The duplicate check here is an early exit
//! only; storage must enforce uniqueness on `(user, checkpoint)` and report a
//! violation as [`CheckInError::AlreadyCompleted`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::geofence::{GeofenceValidation, validate_geofence};
use crate::reachability::resolve_reachability;
use crate::types::{
    Checkpoint, CheckpointId, GeoPoint, Route, RouteConfiguration, RouteDifficulty, RouteId,
    ValidationMethod, ValidationMode,
};

/// Why a check-in attempt was refused.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CheckInError {
    /// Earlier checkpoints of a sequential route are not completed yet.
    #[error("checkpoint is locked until {} earlier checkpoint(s) are completed", blocked_by.len())]
    Locked { blocked_by: Vec<CheckpointId> },

    /// The user already holds a stamp for this checkpoint.
    #[error("checkpoint already completed")]
    AlreadyCompleted,

    /// The user is outside the geofence.
    #[error("you are {distance_meters:.0}m away, need to be within {required_radius_meters:.0}m")]
    OutOfRange {
        distance_meters: f64,
        required_radius_meters: f64,
    },

    /// The supplied partner code does not match.
    #[error("invalid partner code")]
    InvalidCode,

    /// The checkpoint is missing configuration needed for its validation mode.
    #[error("checkpoint is misconfigured: {0}")]
    Configuration(String),

    /// The checkpoint requires a photo and none was supplied.
    #[error("a photo is required for this checkpoint")]
    PhotoRequired,

    /// The checkpoint has coordinates but no location was supplied.
    #[error("your location is required for this checkpoint")]
    LocationRequired,

    /// A partner code is required but none was supplied.
    #[error("a partner code is required for this checkpoint")]
    CodeRequired,

    /// Too many check-ins in the throttle window.
    #[error("too many check-ins, try again later")]
    RateLimited,

    /// The previous check-in was too recent.
    #[error("wait {retry_after_secs}s before the next check-in")]
    CooldownActive { retry_after_secs: i64 },
}

impl CheckInError {
    /// Stable machine-readable identifier for API clients.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Locked { .. } => "locked",
            Self::AlreadyCompleted => "already_completed",
            Self::OutOfRange { .. } => "out_of_range",
            Self::InvalidCode => "invalid_code",
            Self::Configuration(_) => "configuration",
            Self::PhotoRequired => "photo_required",
            Self::LocationRequired => "location_required",
            Self::CodeRequired => "code_required",
            Self::RateLimited => "rate_limited",
            Self::CooldownActive { .. } => "cooldown_active",
        }
    }

    /// Returns `true` for administrative data problems rather than user errors.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// How `mixed` checkpoints treat the partner code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MixedModePolicy {
    /// Proximity suffices; a supplied code is still checked when one is configured.
    #[default]
    ProximitySufficient,
    /// Proximity and a matching partner code are both required.
    RequireCode,
}

impl std::str::FromStr for MixedModePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proximity" | "proximity_sufficient" => Ok(Self::ProximitySufficient),
            "proximity_and_code" | "require_code" => Ok(Self::RequireCode),
            _ => Err(format!("invalid mixed mode policy: {s}")),
        }
    }
}

/// What the user supplied with a check-in attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckInRequest<'a> {
    pub location: Option<GeoPoint>,
    pub code: Option<&'a str>,
    pub has_photo: bool,
}

/// Everything known about the checkpoint and the user's progress on its route.
#[derive(Debug, Clone, Copy)]
pub struct CheckInContext<'a> {
    pub checkpoint: &'a Checkpoint,
    pub route: &'a Route,
    pub configuration: &'a RouteConfiguration,
    /// Full checkpoint set of the route.
    pub route_checkpoints: &'a [Checkpoint],
    /// Checkpoints the user has already stamped on this route.
    pub completed: &'a HashSet<CheckpointId>,
    pub mixed_policy: MixedModePolicy,
}

/// A successful evaluation, ready to be persisted as a stamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckInApproval {
    pub checkpoint_id: CheckpointId,
    pub route_id: RouteId,
    pub points_awarded: i32,
    pub method: ValidationMethod,
    /// Present whenever a user location was evaluated.
    pub geofence: Option<GeofenceValidation>,
}

/// Validate a partner code for a checkpoint.
///
/// Codes are single-use per user, not globally: `already_completed` tells
/// whether this user already holds a stamp for the checkpoint.
///
/// Returns the points the checkpoint awards on a route of `difficulty`.
///
/// # Errors
///
/// - [`CheckInError::Configuration`] if the checkpoint has no code configured
/// - [`CheckInError::AlreadyCompleted`] if the user already completed it
/// - [`CheckInError::CodeRequired`] if `supplied` is blank
/// - [`CheckInError::InvalidCode`] on mismatch
pub fn validate_partner_code(
    checkpoint: &Checkpoint,
    supplied: &str,
    already_completed: bool,
    difficulty: RouteDifficulty,
) -> Result<i32, CheckInError> {
    let Some(expected) = checkpoint.partner_code.as_ref() else {
        return Err(CheckInError::Configuration(
            "no partner code configured".to_owned(),
        ));
    };

    if already_completed {
        return Err(CheckInError::AlreadyCompleted);
    }

    if supplied.trim().is_empty() {
        return Err(CheckInError::CodeRequired);
    }

    if !expected.matches(supplied) {
        return Err(CheckInError::InvalidCode);
    }

    Ok(checkpoint.points(difficulty))
}

/// Evaluate a check-in attempt without side effects.
///
/// # Errors
///
/// Returns the first failed check, in the order listed in the module docs.
pub fn evaluate_check_in(
    ctx: &CheckInContext<'_>,
    request: &CheckInRequest<'_>,
) -> Result<CheckInApproval, CheckInError> {
    let checkpoint = ctx.checkpoint;

    if checkpoint.route_id != ctx.route.id {
        return Err(CheckInError::Configuration(format!(
            "checkpoint {} does not belong to route {}",
            checkpoint.id, ctx.route.id
        )));
    }

    if ctx.configuration.require_sequential {
        let reachability =
            resolve_reachability(ctx.route_checkpoints, ctx.completed, checkpoint, true);
        if !reachability.reachable {
            return Err(CheckInError::Locked {
                blocked_by: reachability.blocked_by,
            });
        }
    }

    if ctx.completed.contains(&checkpoint.id) {
        return Err(CheckInError::AlreadyCompleted);
    }

    let (method, geofence) = match checkpoint.validation_mode {
        ValidationMode::Geofence => {
            let geofence = check_proximity(checkpoint, request.location)?;
            (proximity_method(checkpoint), geofence)
        }
        ValidationMode::Code => {
            let code = request.code.unwrap_or_default();
            validate_partner_code(checkpoint, code, false, ctx.route.difficulty)?;
            let geofence = request
                .location
                .map(|location| validate_geofence(checkpoint, &location));
            (ValidationMethod::Code, geofence)
        }
        ValidationMode::Mixed => {
            let geofence = check_proximity(checkpoint, request.location)?;
            let supplied = request.code.filter(|c| !c.trim().is_empty());
            let check_code = match ctx.mixed_policy {
                MixedModePolicy::RequireCode => true,
                MixedModePolicy::ProximitySufficient => {
                    supplied.is_some() && checkpoint.partner_code.is_some()
                }
            };
            if check_code {
                validate_partner_code(
                    checkpoint,
                    supplied.unwrap_or_default(),
                    false,
                    ctx.route.difficulty,
                )?;
                (ValidationMethod::GeofenceAndCode, geofence)
            } else {
                (proximity_method(checkpoint), geofence)
            }
        }
    };

    if checkpoint.requires_photo && !request.has_photo {
        return Err(CheckInError::PhotoRequired);
    }

    Ok(CheckInApproval {
        checkpoint_id: checkpoint.id,
        route_id: checkpoint.route_id,
        points_awarded: checkpoint.points(ctx.route.difficulty),
        method,
        geofence,
    })
}

/// Proximity half of `geofence` and `mixed` validation.
fn check_proximity(
    checkpoint: &Checkpoint,
    location: Option<GeoPoint>,
) -> Result<Option<GeofenceValidation>, CheckInError> {
    let Some(location) = location else {
        if checkpoint.location.is_some() {
            return Err(CheckInError::LocationRequired);
        }
        return Ok(None);
    };

    let result = validate_geofence(checkpoint, &location);
    if !result.valid {
        return Err(CheckInError::OutOfRange {
            distance_meters: result.distance_meters,
            required_radius_meters: result.required_radius_meters,
        });
    }
    Ok(Some(result))
}

const fn proximity_method(checkpoint: &Checkpoint) -> ValidationMethod {
    if checkpoint.location.is_some() {
        ValidationMethod::Geofence
    } else {
        ValidationMethod::Open
    }
}
