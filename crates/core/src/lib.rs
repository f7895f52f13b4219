//! Tourpass Core - Shared types and check-in validation.
//!
//! This crate provides the domain types of the digital passport and the
//! Proximity & Unlock Validator used by every check-in:
//! - `server` - Check-in service, persistence, and JSON API
//! - `cli` - Command-line tools for migrations and route authoring
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no clocks. Every validation takes its inputs explicitly (the acting
//! user, their completed checkpoints, the current time) so it can be called
//! from any number of request handlers without synchronization.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, coordinates, partner codes, checkpoints, routes, stamps, rewards
//! - [`geofence`] - Distance-to-target and radius checks
//! - [`reachability`] - Sequential unlock policy
//! - [`checkin`] - Check-in evaluation and its error taxonomy
//! - [`throttle`] - Per-user check-in and partner code rate limits
//! - [`progress`] - Stamp fragment progress for a route
//! - [`rewards`] - Partner rewards unlocked by completing a route

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkin;
pub mod geofence;
pub mod progress;
pub mod reachability;
pub mod rewards;
pub mod throttle;
pub mod types;

pub use checkin::{
    CheckInApproval, CheckInContext, CheckInError, CheckInRequest, MixedModePolicy, evaluate_check_in,
    validate_partner_code,
};
pub use geofence::{GeofenceValidation, validate_geofence};
pub use progress::{FragmentProgress, RouteProgress};
pub use reachability::{Reachability, resolve_reachability};
pub use rewards::select_rewards;
pub use throttle::{CheckInThrottle, CodeAttemptThrottle};
pub use types::*;
