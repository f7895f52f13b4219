//! Checkpoints: the physical stops of a route.

use serde::{Deserialize, Serialize};

use super::{CheckpointId, GeoPoint, PartnerCode, RouteDifficulty, RouteId, ValidationMode};

/// Geofence radius used when a checkpoint does not configure one.
pub const DEFAULT_GEOFENCE_RADIUS_METERS: f64 = 100.0;

/// Errors found when validating a checkpoint at authoring time.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CheckpointConfigError {
    /// Checkpoint has no display name.
    #[error("checkpoint name cannot be empty")]
    EmptyName,
    /// Radius is zero, negative, or not finite.
    #[error("geofence radius must be a positive number of meters (got {0})")]
    InvalidRadius(f64),
    /// Mode checks location but the checkpoint has no coordinates.
    #[error("validation mode `{0}` requires coordinates")]
    MissingCoordinates(ValidationMode),
    /// Mode checks a code but none is configured.
    #[error("validation mode `{0}` requires a partner code")]
    MissingPartnerCode(ValidationMode),
    /// Reward points are negative.
    #[error("reward points cannot be negative (got {0})")]
    NegativeReward(i32),
}

/// A single stop within a route that a visitor validates to collect a stamp.
///
/// Checkpoints are owned by administrators; the check-in flow only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub route_id: RouteId,
    pub name: String,
    pub description: Option<String>,
    /// Target coordinates. `None` means proximity is trivially satisfied.
    pub location: Option<GeoPoint>,
    /// Geofence radius in meters. `None` means [`DEFAULT_GEOFENCE_RADIUS_METERS`].
    pub geofence_radius_meters: Option<f64>,
    pub validation_mode: ValidationMode,
    pub partner_code: Option<PartnerCode>,
    pub requires_photo: bool,
    /// Position within the route, ascending.
    pub sequence: i32,
    /// Points for completing this checkpoint. `None` falls back to the route difficulty.
    pub reward_points: Option<i32>,
    /// Which piece of the route's stamp this checkpoint reveals, if any.
    pub stamp_fragment_number: Option<i32>,
}

impl Checkpoint {
    /// Effective geofence radius in meters.
    #[must_use]
    pub fn radius_meters(&self) -> f64 {
        self.geofence_radius_meters.unwrap_or(DEFAULT_GEOFENCE_RADIUS_METERS)
    }

    /// Points awarded for this checkpoint on a route of the given difficulty.
    #[must_use]
    pub fn points(&self, difficulty: RouteDifficulty) -> i32 {
        self.reward_points.unwrap_or_else(|| difficulty.base_points())
    }

    /// Validate the checkpoint as an administrator would save it.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found.
    pub fn validate(&self) -> Result<(), CheckpointConfigError> {
        if self.name.trim().is_empty() {
            return Err(CheckpointConfigError::EmptyName);
        }

        if let Some(radius) = self.geofence_radius_meters
            && (!radius.is_finite() || radius <= 0.0)
        {
            return Err(CheckpointConfigError::InvalidRadius(radius));
        }

        if self.validation_mode.uses_geofence() && self.location.is_none() {
            return Err(CheckpointConfigError::MissingCoordinates(self.validation_mode));
        }

        if self.validation_mode == ValidationMode::Code && self.partner_code.is_none() {
            return Err(CheckpointConfigError::MissingPartnerCode(self.validation_mode));
        }

        if let Some(points) = self.reward_points
            && points < 0
        {
            return Err(CheckpointConfigError::NegativeReward(points));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn checkpoint() -> Checkpoint {
        Checkpoint {
            id: CheckpointId::new(1),
            route_id: RouteId::new(1),
            name: "Gruta do Lago Azul".to_owned(),
            description: None,
            location: Some(GeoPoint::new(-21.1447, -56.5886).unwrap()),
            geofence_radius_meters: None,
            validation_mode: ValidationMode::Geofence,
            partner_code: None,
            requires_photo: false,
            sequence: 1,
            reward_points: None,
            stamp_fragment_number: None,
        }
    }

    #[test]
    fn test_radius_defaults_to_100m() {
        let cp = checkpoint();
        assert!((cp.radius_meters() - 100.0).abs() < f64::EPSILON);

        let cp = Checkpoint {
            geofence_radius_meters: Some(250.0),
            ..checkpoint()
        };
        assert!((cp.radius_meters() - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_points_fall_back_to_difficulty() {
        let cp = checkpoint();
        assert_eq!(cp.points(RouteDifficulty::Medium), 20);

        let cp = Checkpoint {
            reward_points: Some(50),
            ..checkpoint()
        };
        assert_eq!(cp.points(RouteDifficulty::Medium), 50);
    }

    #[test]
    fn test_validate_ok() {
        assert!(checkpoint().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_name() {
        let cp = Checkpoint {
            name: "  ".to_owned(),
            ..checkpoint()
        };
        assert_eq!(cp.validate(), Err(CheckpointConfigError::EmptyName));
    }

    #[test]
    fn test_validate_rejects_bad_radius() {
        let cp = Checkpoint {
            geofence_radius_meters: Some(0.0),
            ..checkpoint()
        };
        assert!(matches!(
            cp.validate(),
            Err(CheckpointConfigError::InvalidRadius(_))
        ));
    }

    #[test]
    fn test_validate_geofence_needs_coordinates() {
        let cp = Checkpoint {
            location: None,
            validation_mode: ValidationMode::Mixed,
            ..checkpoint()
        };
        assert_eq!(
            cp.validate(),
            Err(CheckpointConfigError::MissingCoordinates(
                ValidationMode::Mixed
            ))
        );
    }

    #[test]
    fn test_validate_code_needs_partner_code() {
        let cp = Checkpoint {
            location: None,
            validation_mode: ValidationMode::Code,
            ..checkpoint()
        };
        assert_eq!(
            cp.validate(),
            Err(CheckpointConfigError::MissingPartnerCode(
                ValidationMode::Code
            ))
        );

        let cp = Checkpoint {
            partner_code: Some(PartnerCode::parse("MS-1234").unwrap()),
            ..cp
        };
        assert!(cp.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_reward() {
        let cp = Checkpoint {
            reward_points: Some(-5),
            ..checkpoint()
        };
        assert_eq!(cp.validate(), Err(CheckpointConfigError::NegativeReward(-5)));
    }
}
