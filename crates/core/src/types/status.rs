//! Status and mode enums for passport entities.

use serde::{Deserialize, Serialize};

/// How a checkpoint must be validated before a stamp is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "passport.validation_mode", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// The visitor must be inside the checkpoint's geofence.
    #[default]
    Geofence,
    /// The visitor must enter the partner's code.
    Code,
    /// Proximity, optionally combined with the partner's code.
    Mixed,
}

impl ValidationMode {
    /// Returns `true` if this mode checks the visitor's location.
    #[must_use]
    pub const fn uses_geofence(self) -> bool {
        matches!(self, Self::Geofence | Self::Mixed)
    }
}

impl std::fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Geofence => write!(f, "geofence"),
            Self::Code => write!(f, "code"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

impl std::str::FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geofence" => Ok(Self::Geofence),
            "code" => Ok(Self::Code),
            "mixed" => Ok(Self::Mixed),
            _ => Err(format!("invalid validation mode: {s}")),
        }
    }
}

/// The validation that actually granted a stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "passport.validation_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMethod {
    /// Visitor was inside the geofence.
    Geofence,
    /// Visitor entered a matching partner code.
    Code,
    /// Both proximity and partner code were checked.
    GeofenceAndCode,
    /// Checkpoint has no coordinates and no code was involved.
    Open,
}

impl std::fmt::Display for ValidationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Geofence => write!(f, "geofence"),
            Self::Code => write!(f, "code"),
            Self::GeofenceAndCode => write!(f, "geofence_and_code"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// Route difficulty, which sets the default points per checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "passport.route_difficulty", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RouteDifficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl RouteDifficulty {
    /// Points awarded for a checkpoint that does not configure its own reward.
    #[must_use]
    pub const fn base_points(self) -> i32 {
        match self {
            Self::Easy => 10,
            Self::Medium => 20,
            Self::Hard => 35,
        }
    }
}
