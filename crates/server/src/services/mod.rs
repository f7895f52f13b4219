//! Business logic services for the passport server.
//!
//! # Services
//!
//! - `checkin` - Check-in orchestration, partner codes, progress, passports, rewards
//! - `codes` - Passport number, partner code and voucher code generation

pub mod checkin;
pub mod codes;

pub use checkin::{
    CheckInAttempt, CheckInReceipt, CheckInService, CheckpointView, PassportSummary, RouteView,
    ServiceError,
};
pub use codes::{generate_partner_code, generate_passport_number, generate_voucher_code};
