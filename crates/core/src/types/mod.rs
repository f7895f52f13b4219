//! Core types for Tourpass.
//!
//! This module provides type-safe wrappers for the passport domain.

pub mod checkpoint;
pub mod geo;
pub mod id;
pub mod partner_code;
pub mod reward;
pub mod route;
pub mod stamp;
pub mod status;

pub use checkpoint::{Checkpoint, CheckpointConfigError, DEFAULT_GEOFENCE_RADIUS_METERS};
pub use geo::{EARTH_RADIUS_METERS, GeoPoint, GeoPointError};
pub use id::*;
pub use partner_code::{PartnerCode, PartnerCodeError};
pub use reward::{NewVoucher, Reward, RewardType, Voucher};
pub use route::{Route, RouteConfigError, RouteConfiguration, validate_route_sequences};
pub use stamp::{NewPassport, NewStamp, Passport, PassportTotals, Stamp};
pub use status::*;
