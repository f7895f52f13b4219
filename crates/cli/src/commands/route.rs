//! Route audit: check a route's checkpoints before opening it to visitors.
//!
//! # Usage
//!
//! ```bash
//! tp-cli route audit 7
//! ```
//!
//! Reports every checkpoint configuration problem, duplicated or foreign
//! sequence positions, and stamp fragment numbers outside the route's
//! configured fragment count. Exits non-zero when anything is reported.

use std::collections::HashMap;

use thiserror::Error;

use tourpass_core::{Checkpoint, RouteConfiguration, RouteId, validate_route_sequences};
use tourpass_server::db::{self, PgPassportStore, RepositoryError};
use tourpass_server::store::PassportStore;

use super::{DatabaseError, database_url};

/// Errors that stop an audit from running.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Connection(#[from] DatabaseError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Route {0} not found")]
    RouteNotFound(RouteId),

    #[error("Route {route_id} has {count} problem(s)")]
    ProblemsFound { route_id: RouteId, count: usize },
}

/// Collect every problem with a route's checkpoint set.
#[must_use]
pub fn audit_route(
    route_id: RouteId,
    configuration: &RouteConfiguration,
    checkpoints: &[Checkpoint],
) -> Vec<String> {
    let mut problems: Vec<String> = checkpoints
        .iter()
        .filter_map(|cp| cp.validate().err().map(|e| format!("checkpoint {}: {e}", cp.id)))
        .collect();

    if let Err(e) = validate_route_sequences(route_id, checkpoints) {
        problems.push(e.to_string());
    }

    let mut fragments = HashMap::new();
    for cp in checkpoints {
        let Some(fragment) = cp.stamp_fragment_number else {
            continue;
        };
        if !(1..=configuration.stamp_fragments).contains(&fragment) {
            problems.push(format!(
                "checkpoint {}: fragment {fragment} outside 1..={}",
                cp.id, configuration.stamp_fragments
            ));
        }
        if let Some(first) = fragments.insert(fragment, cp.id) {
            problems.push(format!(
                "checkpoints {first} and {} both reveal fragment {fragment}",
                cp.id
            ));
        }
    }

    problems
}

/// Load a route from the database and print its audit report.
///
/// # Errors
///
/// Returns `AuditError::ProblemsFound` if the route has problems, or another
/// `AuditError` if it could not be loaded.
pub async fn audit(route_id: RouteId) -> Result<(), AuditError> {
    let database_url = database_url()?;
    let pool = db::create_pool(&database_url).await?;
    let store = PgPassportStore::new(pool, std::time::Duration::from_secs(60));

    let route = store
        .get_route(route_id)
        .await?
        .ok_or(AuditError::RouteNotFound(route_id))?;
    let configuration = store
        .get_route_configuration(route_id)
        .await?
        .unwrap_or_else(|| RouteConfiguration::unrestricted(route_id));
    let checkpoints = store.get_route_checkpoints(route_id).await?;

    let problems = audit_route(route_id, &configuration, &checkpoints);

    #[allow(clippy::print_stdout)]
    {
        println!(
            "Route {} \"{}\" ({} checkpoints, {} fragments, sequential: {})",
            route.id,
            route.name,
            checkpoints.len(),
            configuration.stamp_fragments,
            configuration.require_sequential
        );
        for problem in &problems {
            println!("  - {problem}");
        }
        if problems.is_empty() {
            println!("  OK");
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(AuditError::ProblemsFound {
            route_id,
            count: problems.len(),
        })
    }
}
