//! Great-circle distance between two coordinates.
//!
//! Handy when choosing a checkpoint's geofence radius.
//!
//! ```bash
//! tp-cli distance -20.4697 -54.6201 -20.4486 -54.6295
//! ```

use tourpass_core::{GeoPoint, GeoPointError};

/// Distance in meters between two latitude/longitude pairs.
///
/// # Errors
///
/// Returns `GeoPointError` if either coordinate is invalid.
pub fn distance_meters(
    lat1: f64,
    lon1: f64,
    lat2: f64,
    lon2: f64,
) -> Result<f64, GeoPointError> {
    let from = GeoPoint::new(lat1, lon1)?;
    let to = GeoPoint::new(lat2, lon2)?;
    Ok(from.distance_meters(&to))
}

/// Print the distance between two coordinates.
///
/// # Errors
///
/// Returns `GeoPointError` if either coordinate is invalid.
pub fn print_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<(), GeoPointError> {
    let meters = distance_meters(lat1, lon1, lat2, lon2)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{meters:.1} m");
    }
    Ok(())
}
