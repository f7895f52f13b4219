//! Routes and their passport configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Checkpoint, CheckpointId, RouteDifficulty, RouteId};

/// Errors found when validating a route's checkpoint set at authoring time.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteConfigError {
    /// Two checkpoints share a sequence position.
    #[error("checkpoints {first} and {second} share sequence position {sequence}")]
    DuplicateSequence {
        sequence: i32,
        first: CheckpointId,
        second: CheckpointId,
    },
    /// A checkpoint belongs to a different route.
    #[error("checkpoint {checkpoint} belongs to route {actual}, not {expected}")]
    ForeignCheckpoint {
        checkpoint: CheckpointId,
        expected: RouteId,
        actual: RouteId,
    },
}

/// A touristic itinerary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    pub difficulty: RouteDifficulty,
    pub is_active: bool,
}

/// Passport settings of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfiguration {
    pub route_id: RouteId,
    /// Checkpoints must be completed in ascending sequence order.
    pub require_sequential: bool,
    /// Number of fragments that make up the route's stamp.
    pub stamp_fragments: i32,
    /// Visual theme of the stamp (e.g. `onca`, `tuiuiu`).
    pub stamp_theme: Option<String>,
}

impl RouteConfiguration {
    /// Configuration used for routes that have none stored: free order, no fragments.
    #[must_use]
    pub const fn unrestricted(route_id: RouteId) -> Self {
        Self {
            route_id,
            require_sequential: false,
            stamp_fragments: 0,
            stamp_theme: None,
        }
    }
}

/// Check that every checkpoint belongs to `route_id` and that sequence
/// positions are unique, as sequential unlocking requires.
///
/// # Errors
///
/// Returns the first foreign checkpoint or duplicated sequence position.
pub fn validate_route_sequences(
    route_id: RouteId,
    checkpoints: &[Checkpoint],
) -> Result<(), RouteConfigError> {
    let mut seen: HashMap<i32, CheckpointId> = HashMap::with_capacity(checkpoints.len());

    for checkpoint in checkpoints {
        if checkpoint.route_id != route_id {
            return Err(RouteConfigError::ForeignCheckpoint {
                checkpoint: checkpoint.id,
                expected: route_id,
                actual: checkpoint.route_id,
            });
        }
        if let Some(&first) = seen.get(&checkpoint.sequence) {
            return Err(RouteConfigError::DuplicateSequence {
                sequence: checkpoint.sequence,
                first,
                second: checkpoint.id,
            });
        }
        seen.insert(checkpoint.sequence, checkpoint.id);
    }

    Ok(())
}
