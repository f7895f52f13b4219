//! Stamps (completion records) and passports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CheckpointId, GeoPoint, PassportId, RouteId, StampId, UserId, ValidationMethod};

/// Proof that a user completed a checkpoint.
///
/// At most one stamp exists per `(user_id, checkpoint_id)`; stamps are never
/// updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamp {
    pub id: StampId,
    pub user_id: UserId,
    pub checkpoint_id: CheckpointId,
    pub route_id: RouteId,
    pub stamped_at: DateTime<Utc>,
    pub photo_url: Option<String>,
    pub points_earned: i32,
    pub validation_method: ValidationMethod,
    /// Where the user was when checking in, if a location was supplied.
    pub location: Option<GeoPoint>,
}

/// Data needed to persist a new stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStamp {
    pub user_id: UserId,
    pub checkpoint_id: CheckpointId,
    pub route_id: RouteId,
    pub stamped_at: DateTime<Utc>,
    pub photo_url: Option<String>,
    pub points_earned: i32,
    pub validation_method: ValidationMethod,
    pub location: Option<GeoPoint>,
}

impl NewStamp {
    /// Attach a storage-assigned id, producing the persisted record.
    #[must_use]
    pub fn into_stamp(self, id: StampId) -> Stamp {
        Stamp {
            id,
            user_id: self.user_id,
            checkpoint_id: self.checkpoint_id,
            route_id: self.route_id,
            stamped_at: self.stamped_at,
            photo_url: self.photo_url,
            points_earned: self.points_earned,
            validation_method: self.validation_method,
            location: self.location,
        }
    }
}

/// A user's digital passport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passport {
    pub id: PassportId,
    pub user_id: UserId,
    /// Human-readable number, e.g. `MS-m1x2y3z4-AB12CD`.
    pub passport_number: String,
    pub created_at: DateTime<Utc>,
}

/// Data needed to persist a new passport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPassport {
    pub user_id: UserId,
    pub passport_number: String,
    pub created_at: DateTime<Utc>,
}

/// Running totals shown on a passport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassportTotals {
    pub total_stamps: i64,
    pub total_points: i64,
    pub total_routes_completed: i64,
}

impl PassportTotals {
    /// Totals over all of a user's stamps plus the number of routes they completed.
    #[must_use]
    pub fn tally(stamps: &[Stamp], routes_completed: usize) -> Self {
        Self {
            total_stamps: i64::try_from(stamps.len()).unwrap_or(i64::MAX),
            total_points: stamps.iter().map(|s| i64::from(s.points_earned)).sum(),
            total_routes_completed: i64::try_from(routes_completed).unwrap_or(i64::MAX),
        }
    }
}
