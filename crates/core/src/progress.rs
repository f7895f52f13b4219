//! Stamp fragment progress for a route.
//!
//! A route's stamp is split into fragments, each revealed by one checkpoint
//! (`stamp_fragment_number`). Completing every fragment completes the route.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Checkpoint, CheckpointId, RouteConfiguration, RouteId, Stamp};

/// Collection state of one fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentProgress {
    pub checkpoint_id: CheckpointId,
    pub checkpoint_name: String,
    pub fragment_number: i32,
    pub collected: bool,
    pub collected_at: Option<DateTime<Utc>>,
}

/// A user's progress on a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteProgress {
    pub route_id: RouteId,
    pub theme: Option<String>,
    pub total_fragments: i32,
    pub collected_fragments: i32,
    pub completion_percentage: u8,
    pub fragments: Vec<FragmentProgress>,
}

impl RouteProgress {
    /// Compute progress from the route's checkpoints and the user's stamps.
    ///
    /// The total comes from the configuration's `stamp_fragments`; when that
    /// is not set, the number of fragment checkpoints is used instead.
    #[must_use]
    pub fn compute(
        configuration: &RouteConfiguration,
        checkpoints: &[Checkpoint],
        stamps: &[Stamp],
    ) -> Self {
        let mut fragment_checkpoints: Vec<(&Checkpoint, i32)> = checkpoints
            .iter()
            .filter_map(|cp| cp.stamp_fragment_number.map(|n| (cp, n)))
            .collect();
        fragment_checkpoints.sort_by_key(|&(cp, n)| (n, cp.sequence));

        let fragments: Vec<FragmentProgress> = fragment_checkpoints
            .into_iter()
            .map(|(cp, fragment_number)| {
                let stamp = stamps.iter().find(|s| s.checkpoint_id == cp.id);
                FragmentProgress {
                    checkpoint_id: cp.id,
                    checkpoint_name: cp.name.clone(),
                    fragment_number,
                    collected: stamp.is_some(),
                    collected_at: stamp.map(|s| s.stamped_at),
                }
            })
            .collect();

        let fragment_count = i32::try_from(fragments.len()).unwrap_or(i32::MAX);
        let total_fragments = if configuration.stamp_fragments > 0 {
            configuration.stamp_fragments
        } else {
            fragment_count
        };
        let collected_fragments =
            i32::try_from(fragments.iter().filter(|f| f.collected).count()).unwrap_or(i32::MAX);

        Self {
            route_id: configuration.route_id,
            theme: configuration.stamp_theme.clone(),
            total_fragments,
            collected_fragments,
            completion_percentage: percentage(collected_fragments, total_fragments),
            fragments,
        }
    }

    /// Returns `true` once every fragment is collected.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.total_fragments > 0 && self.collected_fragments >= self.total_fragments
    }
}

/// Rounded share of collected fragments. Only a complete route reports 100.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 0..=100
fn percentage(collected: i32, total: i32) -> u8 {
    if total <= 0 {
        return 0;
    }
    let ceiling = if collected >= total { 100.0 } else { 99.0 };
    (f64::from(collected) * 100.0 / f64::from(total))
        .round()
        .clamp(0.0, ceiling) as u8
}
