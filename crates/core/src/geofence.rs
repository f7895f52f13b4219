//! Geofence validation.

use serde::Serialize;

use crate::types::{Checkpoint, CheckpointId, GeoPoint};

/// Outcome of comparing a user's location with a checkpoint's geofence.
///
/// Recomputed on every attempt and never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeofenceValidation {
    pub valid: bool,
    pub distance_meters: f64,
    pub within_radius: bool,
    pub checkpoint_id: CheckpointId,
    pub checkpoint_name: String,
    pub required_radius_meters: f64,
}

impl GeofenceValidation {
    /// Distance rounded to whole meters, for display.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Earth-scale distances fit in i64
    pub fn rounded_distance(&self) -> i64 {
        self.distance_meters.round() as i64
    }
}

/// Check whether `user_location` lies inside the checkpoint's geofence.
///
/// A checkpoint without coordinates is always valid with a distance of zero.
/// Otherwise the attempt is valid iff the haversine distance is at most the
/// checkpoint's radius (inclusive).
#[must_use]
pub fn validate_geofence(checkpoint: &Checkpoint, user_location: &GeoPoint) -> GeofenceValidation {
    let required_radius_meters = checkpoint.radius_meters();

    let distance_meters = checkpoint
        .location
        .as_ref()
        .map_or(0.0, |target| target.distance_meters(user_location));
    let within_radius = distance_meters <= required_radius_meters;

    GeofenceValidation {
        valid: within_radius,
        distance_meters,
        within_radius,
        checkpoint_id: checkpoint.id,
        checkpoint_name: checkpoint.name.clone(),
        required_radius_meters,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{EARTH_RADIUS_METERS, RouteId, ValidationMode};

    fn checkpoint_at(location: Option<GeoPoint>, radius: Option<f64>) -> Checkpoint {
        Checkpoint {
            id: CheckpointId::new(10),
            route_id: RouteId::new(1),
            name: "Praça da Liberdade".to_owned(),
            description: None,
            location,
            geofence_radius_meters: radius,
            validation_mode: ValidationMode::Geofence,
            partner_code: None,
            requires_photo: false,
            sequence: 1,
            reward_points: None,
            stamp_fragment_number: None,
        }
    }

    /// A point `meters` due north of `origin`.
    fn north_of(origin: GeoPoint, meters: f64) -> GeoPoint {
        let delta = (meters / EARTH_RADIUS_METERS).to_degrees();
        GeoPoint::new(origin.latitude() + delta, origin.longitude()).unwrap()
    }

    #[test]
    fn test_inside_radius_is_valid() {
        let target = GeoPoint::new(-20.4486, -54.6295).unwrap();
        let cp = checkpoint_at(Some(target), Some(50.0));

        let result = validate_geofence(&cp, &north_of(target, 30.0));
        assert!(result.valid);
        assert!(result.within_radius);
        assert!((result.distance_meters - 30.0).abs() < 0.01);
        assert_eq!(result.checkpoint_id, cp.id);
        assert!((result.required_radius_meters - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_outside_radius_is_invalid() {
        let target = GeoPoint::new(-20.4486, -54.6295).unwrap();
        let cp = checkpoint_at(Some(target), Some(50.0));

        let result = validate_geofence(&cp, &north_of(target, 340.0));
        assert!(!result.valid);
        assert_eq!(result.rounded_distance(), 340);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let target = GeoPoint::new(0.0, 0.0).unwrap();
        let user = north_of(target, 100.0);
        let exact = target.distance_meters(&user);

        let at_radius = checkpoint_at(Some(target), Some(exact));
        assert!(validate_geofence(&at_radius, &user).valid);

        let just_short = checkpoint_at(Some(target), Some(exact - 1.0));
        assert!(!validate_geofence(&just_short, &user).valid);
    }

    #[test]
    fn test_default_radius_applies() {
        let target = GeoPoint::new(-20.4486, -54.6295).unwrap();
        let cp = checkpoint_at(Some(target), None);

        assert!(validate_geofence(&cp, &north_of(target, 99.0)).valid);
        assert!(!validate_geofence(&cp, &north_of(target, 101.0)).valid);
    }

    #[test]
    fn test_no_coordinates_always_valid() {
        let cp = checkpoint_at(None, Some(10.0));
        for user in [
            GeoPoint::new(0.0, 0.0).unwrap(),
            GeoPoint::new(89.0, 179.0).unwrap(),
            GeoPoint::new(-45.0, -120.0).unwrap(),
        ] {
            let result = validate_geofence(&cp, &user);
            assert!(result.valid);
            assert!(result.distance_meters.abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_repeatable() {
        let target = GeoPoint::new(-20.4486, -54.6295).unwrap();
        let cp = checkpoint_at(Some(target), Some(50.0));
        let user = north_of(target, 45.0);
        assert_eq!(validate_geofence(&cp, &user), validate_geofence(&cp, &user));
    }
}
