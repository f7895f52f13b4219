//! Check-in orchestration.
//!
//! Loads everything a check-in decision needs from the [`PassportStore`],
//! delegates the decision to `tourpass_core`, then persists the stamp. A stamp
//! that completes a route also issues the route's partner reward vouchers.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use tourpass_core::{
    CheckInContext, CheckInError, CheckInRequest, CheckInThrottle, Checkpoint, CheckpointId,
    CodeAttemptThrottle, GeoPoint, GeofenceValidation, MixedModePolicy, NewPassport, NewStamp,
    NewVoucher, Passport, PassportTotals, Reachability, Reward, Route, RouteConfiguration,
    RouteId, RouteProgress, Stamp, UserId, ValidationMethod, ValidationMode, Voucher,
    evaluate_check_in, resolve_reachability, select_rewards, validate_geofence,
};

use super::codes::{
    DEFAULT_PASSPORT_PREFIX, DEFAULT_VOUCHER_PREFIX, generate_passport_number,
    generate_voucher_code,
};
use crate::config::CheckInConfig;
use crate::db::RepositoryError;
use crate::error::add_breadcrumb;
use crate::store::PassportStore;

const PASSPORT_NUMBER_ATTEMPTS: usize = 3;
const VOUCHER_CODE_ATTEMPTS: usize = 3;

/// Errors returned by [`CheckInService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The attempt was evaluated and rejected.
    #[error(transparent)]
    CheckIn(#[from] CheckInError),

    #[error("checkpoint {0} not found")]
    CheckpointNotFound(CheckpointId),

    #[error("route {0} not found")]
    RouteNotFound(RouteId),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What the user sent with a check-in.
#[derive(Debug, Clone, Default)]
pub struct CheckInAttempt {
    pub location: Option<GeoPoint>,
    pub code: Option<String>,
    pub photo_url: Option<String>,
}

impl CheckInAttempt {
    fn as_request(&self) -> CheckInRequest<'_> {
        CheckInRequest {
            location: self.location,
            code: self.code.as_deref(),
            has_photo: self
                .photo_url
                .as_deref()
                .is_some_and(|url| !url.trim().is_empty()),
        }
    }

    fn has_code(&self) -> bool {
        self.code.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// Result of a successful check-in.
#[derive(Debug, Clone, Serialize)]
pub struct CheckInReceipt {
    pub stamp: Stamp,
    pub points_awarded: i32,
    pub method: ValidationMethod,
    /// The checkpoint revealed a fragment of the route stamp.
    pub fragment_collected: bool,
    /// This stamp completed every fragment of the route.
    pub route_completed: bool,
    pub geofence: Option<GeofenceValidation>,
    /// Vouchers issued because this stamp completed the route.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rewards_unlocked: Vec<Voucher>,
}

/// A checkpoint as shown to a visitor. The partner code is never included.
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointView {
    pub id: CheckpointId,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<GeoPoint>,
    pub geofence_radius_meters: f64,
    pub validation_mode: ValidationMode,
    pub requires_photo: bool,
    pub sequence: i32,
    pub points: i32,
    pub stamp_fragment_number: Option<i32>,
    pub stamped_at: Option<DateTime<Utc>>,
    pub reachable: bool,
}

/// A route with everything a visitor needs to walk it.
#[derive(Debug, Clone, Serialize)]
pub struct RouteView {
    pub route: Route,
    pub configuration: RouteConfiguration,
    pub checkpoints: Vec<CheckpointView>,
    /// Rewards still on offer for completing the route.
    pub rewards: Vec<Reward>,
    pub progress: RouteProgress,
}

/// A passport with its running totals and the vouchers it holds.
#[derive(Debug, Clone, Serialize)]
pub struct PassportSummary {
    #[serde(flatten)]
    pub passport: Passport,
    #[serde(flatten)]
    pub totals: PassportTotals,
    pub vouchers: Vec<Voucher>,
}

/// A checkpoint together with its route data.
struct CatalogEntry {
    checkpoint: Checkpoint,
    route: Route,
    configuration: RouteConfiguration,
}

/// Digital passport operations for a single store.
pub struct CheckInService<S> {
    store: S,
    mixed_policy: MixedModePolicy,
    throttle: CheckInThrottle,
    code_attempts: CodeAttemptThrottle,
}

impl<S: PassportStore> CheckInService<S> {
    #[must_use]
    pub const fn new(store: S, config: CheckInConfig) -> Self {
        Self {
            store,
            mixed_policy: config.mixed_policy,
            throttle: config.throttle,
            code_attempts: config.code_attempts,
        }
    }

    /// Get a reference to the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Attempt a check-in at the current time.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::CheckIn` when the attempt is rejected, the
    /// not-found variants for unknown ids, and `ServiceError::Repository` on
    /// storage failures.
    pub async fn attempt_check_in(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        attempt: &CheckInAttempt,
    ) -> Result<CheckInReceipt, ServiceError> {
        self.attempt_check_in_at(user_id, checkpoint_id, attempt, Utc::now())
            .await
    }

    /// Attempt a check-in as of `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::attempt_check_in`].
    #[instrument(skip(self, attempt), fields(user_id = %user_id, checkpoint_id = %checkpoint_id))]
    pub async fn attempt_check_in_at(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        attempt: &CheckInAttempt,
        now: DateTime<Utc>,
    ) -> Result<CheckInReceipt, ServiceError> {
        let CatalogEntry {
            checkpoint,
            route,
            configuration,
        } = self.load_catalog_entry(checkpoint_id).await?;
        if attempt.has_code() {
            self.check_code_attempts(user_id, checkpoint_id, now).await?;
        }
        let route_checkpoints = self.store.get_route_checkpoints(route.id).await?;
        let completed = self
            .store
            .list_completed_checkpoint_ids(user_id, route.id)
            .await?;

        let ctx = CheckInContext {
            checkpoint: &checkpoint,
            route: &route,
            configuration: &configuration,
            route_checkpoints: &route_checkpoints,
            completed: &completed,
            mixed_policy: self.mixed_policy,
        };
        let approval = match evaluate_check_in(&ctx, &attempt.as_request()) {
            Ok(approval) => approval,
            Err(e) => {
                debug!(reason = e.kind(), "Check-in rejected");
                if matches!(e, CheckInError::InvalidCode) {
                    self.store
                        .record_code_failure(user_id, checkpoint_id, now)
                        .await?;
                }
                return Err(e.into());
            }
        };

        let recent = self
            .store
            .list_stamp_times_since(user_id, self.throttle.lookback_start(now))
            .await?;
        self.throttle.check(&recent, now).inspect_err(|e| {
            info!(reason = e.kind(), "Check-in throttled");
        })?;

        let new_stamp = NewStamp {
            user_id,
            checkpoint_id,
            route_id: route.id,
            stamped_at: now,
            photo_url: attempt.photo_url.clone(),
            points_earned: approval.points_awarded,
            validation_method: approval.method,
            location: attempt.location,
        };
        let stamp = match self.store.insert_stamp(new_stamp).await {
            Ok(stamp) => stamp,
            // A concurrent attempt for the same checkpoint won the race.
            Err(RepositoryError::Conflict(_)) => {
                warn!("Duplicate stamp rejected by storage");
                return Err(CheckInError::AlreadyCompleted.into());
            }
            Err(e) => return Err(e.into()),
        };

        let stamps = self.store.list_route_stamps(user_id, route.id).await?;
        let progress = RouteProgress::compute(&configuration, &route_checkpoints, &stamps);
        let fragment_collected = checkpoint.stamp_fragment_number.is_some();
        let route_completed = fragment_collected && progress.is_complete();
        let rewards_unlocked = if route_completed {
            // The stamp is already stored, so a reward failure must not fail the check-in.
            self.unlock_rewards(user_id, route.id, now)
                .await
                .unwrap_or_else(|e| {
                    error!(error = %e, route_id = %route.id, "Failed to unlock rewards");
                    Vec::new()
                })
        } else {
            Vec::new()
        };

        info!(
            stamp_id = %stamp.id,
            route_id = %route.id,
            points = approval.points_awarded,
            method = %approval.method,
            distance_meters = approval.geofence.as_ref().map(GeofenceValidation::rounded_distance),
            route_completed,
            rewards_unlocked = rewards_unlocked.len(),
            "Check-in recorded"
        );
        add_breadcrumb(
            "passport",
            "Checkpoint stamped",
            Some(&[("checkpoint_id", &checkpoint_id.to_string())]),
        );

        Ok(CheckInReceipt {
            stamp,
            points_awarded: approval.points_awarded,
            method: approval.method,
            fragment_collected,
            route_completed,
            geofence: approval.geofence,
            rewards_unlocked,
        })
    }

    /// Check a partner code without recording a stamp.
    ///
    /// Returns the points the checkpoint would award. Wrong codes count
    /// towards the same per-user limit as code check-ins.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::CheckIn` with `Configuration`, `AlreadyCompleted`,
    /// `CodeRequired`, `InvalidCode` or `RateLimited`.
    pub async fn validate_partner_code(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        code: &str,
    ) -> Result<i32, ServiceError> {
        self.validate_partner_code_at(user_id, checkpoint_id, code, Utc::now())
            .await
    }

    /// Check a partner code as of `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::validate_partner_code`].
    #[instrument(skip(self, code), fields(user_id = %user_id, checkpoint_id = %checkpoint_id))]
    pub async fn validate_partner_code_at(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<i32, ServiceError> {
        let entry = self.load_catalog_entry(checkpoint_id).await?;
        self.check_code_attempts(user_id, checkpoint_id, now).await?;
        let already_completed = self
            .store
            .find_stamp(user_id, checkpoint_id)
            .await?
            .is_some();

        match tourpass_core::validate_partner_code(
            &entry.checkpoint,
            code,
            already_completed,
            entry.route.difficulty,
        ) {
            Ok(points) => Ok(points),
            Err(CheckInError::InvalidCode) => {
                debug!("Wrong partner code");
                self.store
                    .record_code_failure(user_id, checkpoint_id, now)
                    .await?;
                Err(CheckInError::InvalidCode.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the user may attempt a checkpoint now.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::CheckpointNotFound` or a storage error.
    #[instrument(skip(self))]
    pub async fn reachability(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
    ) -> Result<Reachability, ServiceError> {
        let entry = self.load_catalog_entry(checkpoint_id).await?;
        if !entry.configuration.require_sequential {
            return Ok(Reachability::open());
        }

        let route_checkpoints = self.store.get_route_checkpoints(entry.route.id).await?;
        let completed = self
            .store
            .list_completed_checkpoint_ids(user_id, entry.route.id)
            .await?;

        Ok(resolve_reachability(
            &route_checkpoints,
            &completed,
            &entry.checkpoint,
            true,
        ))
    }

    /// Distance check against a checkpoint's geofence, without side effects.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::CheckpointNotFound`, `ServiceError::RouteNotFound`
    /// for an inactive route, or a storage error.
    pub async fn geofence(
        &self,
        checkpoint_id: CheckpointId,
        location: &GeoPoint,
    ) -> Result<GeofenceValidation, ServiceError> {
        let entry = self.load_catalog_entry(checkpoint_id).await?;
        Ok(validate_geofence(&entry.checkpoint, location))
    }

    /// The user's stamp fragment progress on a route.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::RouteNotFound` or a storage error.
    #[instrument(skip(self))]
    pub async fn route_progress(
        &self,
        user_id: UserId,
        route_id: RouteId,
    ) -> Result<RouteProgress, ServiceError> {
        let route = self
            .store
            .get_route(route_id)
            .await?
            .filter(|r| r.is_active)
            .ok_or(ServiceError::RouteNotFound(route_id))?;
        let configuration = self.configuration_or_default(route.id).await?;
        let checkpoints = self.store.get_route_checkpoints(route.id).await?;
        let stamps = self.store.list_route_stamps(user_id, route.id).await?;

        Ok(RouteProgress::compute(&configuration, &checkpoints, &stamps))
    }

    /// A route with its checkpoints, the user's stamps and the rewards on offer.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::RouteNotFound` for unknown or inactive routes, or
    /// a storage error.
    #[instrument(skip(self))]
    pub async fn route_view(
        &self,
        user_id: UserId,
        route_id: RouteId,
    ) -> Result<RouteView, ServiceError> {
        let route = self
            .store
            .get_route(route_id)
            .await?
            .filter(|r| r.is_active)
            .ok_or(ServiceError::RouteNotFound(route_id))?;
        let configuration = self.configuration_or_default(route.id).await?;
        let checkpoints = self.store.get_route_checkpoints(route.id).await?;
        let stamps = self.store.list_route_stamps(user_id, route.id).await?;
        let completed: HashSet<CheckpointId> = stamps.iter().map(|s| s.checkpoint_id).collect();
        let now = Utc::now();
        let rewards = self
            .store
            .list_route_rewards(route.id)
            .await?
            .into_iter()
            .filter(|r| r.is_available(now))
            .collect();

        let views = checkpoints
            .iter()
            .map(|cp| CheckpointView {
                id: cp.id,
                name: cp.name.clone(),
                description: cp.description.clone(),
                location: cp.location,
                geofence_radius_meters: cp.radius_meters(),
                validation_mode: cp.validation_mode,
                requires_photo: cp.requires_photo,
                sequence: cp.sequence,
                points: cp.points(route.difficulty),
                stamp_fragment_number: cp.stamp_fragment_number,
                stamped_at: stamps
                    .iter()
                    .find(|s| s.checkpoint_id == cp.id)
                    .map(|s| s.stamped_at),
                reachable: resolve_reachability(
                    &checkpoints,
                    &completed,
                    cp,
                    configuration.require_sequential,
                )
                .reachable,
            })
            .collect();
        let progress = RouteProgress::compute(&configuration, &checkpoints, &stamps);

        Ok(RouteView {
            route,
            configuration,
            checkpoints: views,
            rewards,
            progress,
        })
    }

    /// The user's passport with totals and vouchers, issuing it on first request.
    ///
    /// # Errors
    ///
    /// See [`Self::get_or_create_passport`].
    #[instrument(skip(self))]
    pub async fn passport_summary(&self, user_id: UserId) -> Result<PassportSummary, ServiceError> {
        let passport = self.get_or_create_passport(user_id).await?;
        let stamps = self.store.list_user_stamps(user_id).await?;

        let route_ids: BTreeSet<RouteId> = stamps.iter().map(|s| s.route_id).collect();
        let mut routes_completed = 0;
        for route_id in route_ids {
            let route_stamps: Vec<Stamp> = stamps
                .iter()
                .filter(|s| s.route_id == route_id)
                .cloned()
                .collect();
            let configuration = self.configuration_or_default(route_id).await?;
            let checkpoints = self.store.get_route_checkpoints(route_id).await?;
            if RouteProgress::compute(&configuration, &checkpoints, &route_stamps).is_complete() {
                routes_completed += 1;
            }
        }

        Ok(PassportSummary {
            passport,
            totals: PassportTotals::tally(&stamps, routes_completed),
            vouchers: self.store.list_user_vouchers(user_id).await?,
        })
    }

    /// The user's passport, issuing one on first request.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or `Repository(Conflict)` if no free passport
    /// number was found.
    #[instrument(skip(self))]
    pub async fn get_or_create_passport(&self, user_id: UserId) -> Result<Passport, ServiceError> {
        if let Some(passport) = self.store.find_passport(user_id).await? {
            return Ok(passport);
        }

        let mut last_conflict = None;
        for _ in 0..PASSPORT_NUMBER_ATTEMPTS {
            let now = Utc::now();
            let new_passport = NewPassport {
                user_id,
                passport_number: generate_passport_number(DEFAULT_PASSPORT_PREFIX, now),
                created_at: now,
            };

            match self.store.insert_passport(new_passport).await {
                Ok(passport) => {
                    info!(passport_number = %passport.passport_number, "Passport issued");
                    return Ok(passport);
                }
                Err(RepositoryError::Conflict(msg)) => {
                    // Either a concurrent request issued one, or the number collided.
                    if let Some(passport) = self.store.find_passport(user_id).await? {
                        return Ok(passport);
                    }
                    last_conflict = Some(msg);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RepositoryError::Conflict(
            last_conflict.unwrap_or_else(|| "passport number".to_owned()),
        )
        .into())
    }

    async fn check_code_attempts(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let since = self.code_attempts.lookback_start(now);
        let failures = self
            .store
            .list_code_failures_since(user_id, checkpoint_id, since)
            .await?;
        self.code_attempts.check(&failures, now).inspect_err(|_| {
            warn!(failures = failures.len(), "Too many wrong partner codes");
        })?;
        Ok(())
    }

    /// Issue vouchers for every reward the user unlocked on `route_id`.
    async fn unlock_rewards(
        &self,
        user_id: UserId,
        route_id: RouteId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Voucher>, ServiceError> {
        let rewards = self.store.list_route_rewards(route_id).await?;
        if rewards.is_empty() {
            return Ok(Vec::new());
        }
        let issued = self.store.count_issued_vouchers(route_id).await?;
        let held: Vec<Voucher> = self
            .store
            .list_user_vouchers(user_id)
            .await?
            .into_iter()
            .filter(|v| v.route_id == route_id)
            .collect();

        let mut vouchers = Vec::new();
        for reward in select_rewards(&rewards, &issued, &held, now) {
            vouchers.push(self.issue_voucher(user_id, reward, now).await?);
        }
        Ok(vouchers)
    }

    async fn issue_voucher(
        &self,
        user_id: UserId,
        reward: &Reward,
        now: DateTime<Utc>,
    ) -> Result<Voucher, ServiceError> {
        let prefix = reward
            .code_prefix
            .as_deref()
            .unwrap_or(DEFAULT_VOUCHER_PREFIX);

        let mut last_conflict = None;
        for _ in 0..VOUCHER_CODE_ATTEMPTS {
            let new_voucher = NewVoucher {
                voucher_code: generate_voucher_code(prefix),
                user_id,
                reward_id: reward.id,
                route_id: reward.route_id,
                created_at: now,
            };
            match self.store.insert_voucher(new_voucher).await {
                Ok(voucher) => {
                    info!(reward_id = %reward.id, partner = %reward.partner_name, "Reward unlocked");
                    return Ok(voucher);
                }
                Err(RepositoryError::Conflict(msg)) => last_conflict = Some(msg),
                Err(e) => return Err(e.into()),
            }
        }

        Err(RepositoryError::Conflict(
            last_conflict.unwrap_or_else(|| "voucher code".to_owned()),
        )
        .into())
    }

    async fn load_catalog_entry(
        &self,
        checkpoint_id: CheckpointId,
    ) -> Result<CatalogEntry, ServiceError> {
        let checkpoint = self
            .store
            .get_checkpoint(checkpoint_id)
            .await?
            .ok_or(ServiceError::CheckpointNotFound(checkpoint_id))?;

        let route = self
            .store
            .get_route(checkpoint.route_id)
            .await?
            .ok_or_else(|| {
                CheckInError::Configuration(format!(
                    "checkpoint {checkpoint_id} references missing route {}",
                    checkpoint.route_id
                ))
            })?;
        if !route.is_active {
            return Err(ServiceError::RouteNotFound(route.id));
        }

        let configuration = self.configuration_or_default(route.id).await?;
        Ok(CatalogEntry {
            checkpoint,
            route,
            configuration,
        })
    }

    async fn configuration_or_default(
        &self,
        route_id: RouteId,
    ) -> Result<RouteConfiguration, ServiceError> {
        Ok(self
            .store
            .get_route_configuration(route_id)
            .await?
            .unwrap_or_else(|| RouteConfiguration::unrestricted(route_id)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::store::MemoryPassportStore;
    use tourpass_core::{PartnerCode, RouteDifficulty, ValidationMode};

    const USER: UserId = UserId::new(7);

    fn origin() -> GeoPoint {
        GeoPoint::new(-20.4697, -54.6201).unwrap()
    }

    fn checkpoint(id: i32, sequence: i32) -> Checkpoint {
        Checkpoint {
            id: CheckpointId::new(id),
            route_id: RouteId::new(1),
            name: format!("Checkpoint {id}"),
            description: None,
            location: Some(origin()),
            geofence_radius_meters: Some(50.0),
            validation_mode: ValidationMode::Geofence,
            partner_code: None,
            requires_photo: false,
            sequence,
            reward_points: None,
            stamp_fragment_number: Some(sequence),
        }
    }

    async fn service(sequential: bool) -> CheckInService<MemoryPassportStore> {
        let store = MemoryPassportStore::new();
        store
            .put_route(Route {
                id: RouteId::new(1),
                name: "Rota Bonito".to_owned(),
                difficulty: RouteDifficulty::Medium,
                is_active: true,
            })
            .await;
        store
            .put_route_configuration(RouteConfiguration {
                route_id: RouteId::new(1),
                require_sequential: sequential,
                stamp_fragments: 2,
                stamp_theme: Some("tuiuiu".to_owned()),
            })
            .await;
        store.put_checkpoint(checkpoint(1, 1)).await;
        store
            .put_checkpoint(Checkpoint {
                validation_mode: ValidationMode::Code,
                location: None,
                partner_code: Some(PartnerCode::parse("RIO-1234").unwrap()),
                ..checkpoint(2, 2)
            })
            .await;

        CheckInService::new(store, CheckInConfig::default())
    }

    fn at(location: GeoPoint) -> CheckInAttempt {
        CheckInAttempt {
            location: Some(location),
            ..CheckInAttempt::default()
        }
    }

    fn time(offset_minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap() + TimeDelta::minutes(offset_minutes)
    }

    #[tokio::test]
    async fn test_check_in_records_stamp() {
        let service = service(true).await;
        let receipt = service
            .attempt_check_in_at(USER, CheckpointId::new(1), &at(origin()), time(0))
            .await
            .unwrap();

        assert_eq!(receipt.points_awarded, 20);
        assert_eq!(receipt.method, ValidationMethod::Geofence);
        assert!(receipt.fragment_collected);
        assert!(!receipt.route_completed);
        assert_eq!(receipt.stamp.stamped_at, time(0));
        assert_eq!(service.store().stamp_count().await, 1);
    }

    #[tokio::test]
    async fn test_second_check_in_is_already_completed() {
        let service = service(false).await;
        service
            .attempt_check_in_at(USER, CheckpointId::new(1), &at(origin()), time(0))
            .await
            .unwrap();

        let err = service
            .attempt_check_in_at(USER, CheckpointId::new(1), &at(origin()), time(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::CheckIn(CheckInError::AlreadyCompleted)
        ));
        assert_eq!(service.store().stamp_count().await, 1);
    }

    #[tokio::test]
    async fn test_locked_checkpoint_is_not_stamped() {
        let service = service(true).await;
        let attempt = CheckInAttempt {
            code: Some("rio-1234".to_owned()),
            ..CheckInAttempt::default()
        };
        let err = service
            .attempt_check_in_at(USER, CheckpointId::new(2), &attempt, time(0))
            .await
            .unwrap_err();

        match err {
            ServiceError::CheckIn(CheckInError::Locked { blocked_by }) => {
                assert_eq!(blocked_by, vec![CheckpointId::new(1)]);
            }
            other => panic!("expected Locked, got {other:?}"),
        }
        assert_eq!(service.store().stamp_count().await, 0);
    }

    #[tokio::test]
    async fn test_cooldown_between_check_ins() {
        let service = service(false).await;
        service
            .attempt_check_in_at(USER, CheckpointId::new(1), &at(origin()), time(0))
            .await
            .unwrap();

        let attempt = CheckInAttempt {
            code: Some("RIO-1234".to_owned()),
            ..CheckInAttempt::default()
        };
        let soon = time(0) + TimeDelta::seconds(10);
        let err = service
            .attempt_check_in_at(USER, CheckpointId::new(2), &attempt, soon)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::CheckIn(CheckInError::CooldownActive { retry_after_secs: 20 })
        ));

        let receipt = service
            .attempt_check_in_at(USER, CheckpointId::new(2), &attempt, time(1))
            .await
            .unwrap();
        assert_eq!(receipt.method, ValidationMethod::Code);
        assert!(receipt.route_completed);
    }

    #[tokio::test]
    async fn test_validate_partner_code() {
        let service = service(false).await;
        let points = service
            .validate_partner_code(USER, CheckpointId::new(2), "  rio-1234 ")
            .await
            .unwrap();
        assert_eq!(points, 20);

        let err = service
            .validate_partner_code(USER, CheckpointId::new(2), "RIO-9999")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CheckIn(CheckInError::InvalidCode)));

        let err = service
            .validate_partner_code(USER, CheckpointId::new(1), "RIO-1234")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::CheckIn(CheckInError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_checkpoint() {
        let service = service(false).await;
        let err = service
            .attempt_check_in(USER, CheckpointId::new(99), &CheckInAttempt::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CheckpointNotFound(id) if id.as_i32() == 99));
    }

    #[tokio::test]
    async fn test_reachability_follows_stamps() {
        let service = service(true).await;
        let before = service.reachability(USER, CheckpointId::new(2)).await.unwrap();
        assert!(!before.reachable);

        service
            .attempt_check_in_at(USER, CheckpointId::new(1), &at(origin()), time(0))
            .await
            .unwrap();
        let after = service.reachability(USER, CheckpointId::new(2)).await.unwrap();
        assert_eq!(after, Reachability::open());
    }

    #[tokio::test]
    async fn test_passport_created_once() {
        let service = service(false).await;
        let first = service.get_or_create_passport(USER).await.unwrap();
        let second = service.get_or_create_passport(USER).await.unwrap();

        assert_eq!(first, second);
        assert!(first.passport_number.starts_with("MS-"));
    }

    #[tokio::test]
    async fn test_geofence_for_inactive_route_is_not_found() {
        let service = service(false).await;
        assert!(service.geofence(CheckpointId::new(1), &origin()).await.is_ok());

        service
            .store()
            .put_route(Route {
                id: RouteId::new(1),
                name: "Rota Bonito".to_owned(),
                difficulty: RouteDifficulty::Medium,
                is_active: false,
            })
            .await;
        let err = service
            .geofence(CheckpointId::new(1), &origin())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RouteNotFound(id) if id.as_i32() == 1));
    }

    #[tokio::test]
    async fn test_wrong_check_in_codes_are_limited() {
        let service = service(false).await;
        let wrong = CheckInAttempt {
            code: Some("RIO-0000".to_owned()),
            ..CheckInAttempt::default()
        };
        for i in 0..5 {
            let err = service
                .attempt_check_in_at(USER, CheckpointId::new(2), &wrong, time(i))
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::CheckIn(CheckInError::InvalidCode)));
        }

        let right = CheckInAttempt {
            code: Some("RIO-1234".to_owned()),
            ..CheckInAttempt::default()
        };
        let err = service
            .attempt_check_in_at(USER, CheckpointId::new(2), &right, time(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CheckIn(CheckInError::RateLimited)));
        assert_eq!(service.store().stamp_count().await, 0);
    }

    #[tokio::test]
    async fn test_progress_for_unknown_route() {
        let service = service(false).await;
        let err = service
            .route_progress(USER, RouteId::new(42))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RouteNotFound(_)));
    }
}
