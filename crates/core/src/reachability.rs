//! Sequential unlock policy.
//!
//! With sequential completion enabled, a checkpoint can be attempted only once
//! every checkpoint with a strictly lower sequence position is completed. This
//! is a forward chain, not a DAG; sequence positions are expected to be unique
//! (see [`crate::validate_route_sequences`]).

use std::collections::HashSet;

use serde::Serialize;

use crate::types::{Checkpoint, CheckpointId};

/// Whether a checkpoint may be attempted, and what blocks it otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reachability {
    pub reachable: bool,
    /// Uncompleted prerequisites in ascending sequence order. Empty when reachable.
    pub blocked_by: Vec<CheckpointId>,
}

impl Reachability {
    /// A reachable result with no blockers.
    #[must_use]
    pub const fn open() -> Self {
        Self {
            reachable: true,
            blocked_by: Vec::new(),
        }
    }
}

/// Decide whether `target` is reachable on a route.
///
/// `checkpoints` is the full checkpoint set of the route in any order;
/// `completed` holds the checkpoints the user has already stamped.
#[must_use]
pub fn resolve_reachability(
    checkpoints: &[Checkpoint],
    completed: &HashSet<CheckpointId>,
    target: &Checkpoint,
    sequential: bool,
) -> Reachability {
    if !sequential {
        return Reachability::open();
    }

    let mut prerequisites: Vec<&Checkpoint> = checkpoints
        .iter()
        .filter(|cp| cp.id != target.id && cp.sequence < target.sequence)
        .collect();
    prerequisites.sort_by_key(|cp| (cp.sequence, cp.id));

    let blocked_by: Vec<CheckpointId> = prerequisites
        .into_iter()
        .filter(|cp| !completed.contains(&cp.id))
        .map(|cp| cp.id)
        .collect();

    Reachability {
        reachable: blocked_by.is_empty(),
        blocked_by,
    }
}
