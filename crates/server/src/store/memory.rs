//! In-memory [`PassportStore`] used by tests and local tooling.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use tourpass_core::{
    Checkpoint, CheckpointId, NewPassport, NewStamp, NewVoucher, Passport, PassportId, Reward,
    RewardId, Route, RouteConfiguration, RouteId, Stamp, StampId, UserId, Voucher, VoucherId,
};

use super::PassportStore;
use crate::db::RepositoryError;

/// Passport store held entirely in process memory.
///
/// Enforces the same uniqueness rules as the `PostgreSQL` schema.
#[derive(Debug, Default)]
pub struct MemoryPassportStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    routes: HashMap<RouteId, Route>,
    configurations: HashMap<RouteId, RouteConfiguration>,
    checkpoints: BTreeMap<CheckpointId, Checkpoint>,
    stamps: Vec<Stamp>,
    passports: Vec<Passport>,
    rewards: BTreeMap<RewardId, Reward>,
    vouchers: Vec<Voucher>,
    code_failures: Vec<(UserId, CheckpointId, DateTime<Utc>)>,
    last_stamp_id: i32,
    last_passport_id: i32,
    last_voucher_id: i32,
}

impl MemoryPassportStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a route.
    pub async fn put_route(&self, route: Route) {
        self.inner.write().await.routes.insert(route.id, route);
    }

    /// Add or replace a route configuration.
    pub async fn put_route_configuration(&self, configuration: RouteConfiguration) {
        self.inner
            .write()
            .await
            .configurations
            .insert(configuration.route_id, configuration);
    }

    /// Add or replace a checkpoint.
    pub async fn put_checkpoint(&self, checkpoint: Checkpoint) {
        self.inner
            .write()
            .await
            .checkpoints
            .insert(checkpoint.id, checkpoint);
    }

    /// Add or replace a reward.
    pub async fn put_reward(&self, reward: Reward) {
        self.inner.write().await.rewards.insert(reward.id, reward);
    }

    /// Number of stamps stored, across all users.
    pub async fn stamp_count(&self) -> usize {
        self.inner.read().await.stamps.len()
    }

    /// Number of vouchers issued, across all users.
    pub async fn voucher_count(&self) -> usize {
        self.inner.read().await.vouchers.len()
    }
}

impl PassportStore for MemoryPassportStore {
    async fn find_stamp(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
    ) -> Result<Option<Stamp>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .stamps
            .iter()
            .find(|s| s.user_id == user_id && s.checkpoint_id == checkpoint_id)
            .cloned())
    }

    async fn insert_stamp(&self, stamp: NewStamp) -> Result<Stamp, RepositoryError> {
        let mut inner = self.inner.write().await;
        if inner
            .stamps
            .iter()
            .any(|s| s.user_id == stamp.user_id && s.checkpoint_id == stamp.checkpoint_id)
        {
            return Err(RepositoryError::Conflict("stamp already exists".to_owned()));
        }

        inner.last_stamp_id += 1;
        let stamp = stamp.into_stamp(StampId::new(inner.last_stamp_id));
        inner.stamps.push(stamp.clone());
        Ok(stamp)
    }

    async fn list_completed_checkpoint_ids(
        &self,
        user_id: UserId,
        route_id: RouteId,
    ) -> Result<HashSet<CheckpointId>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .stamps
            .iter()
            .filter(|s| s.user_id == user_id && s.route_id == route_id)
            .map(|s| s.checkpoint_id)
            .collect())
    }

    async fn get_route_checkpoints(
        &self,
        route_id: RouteId,
    ) -> Result<Vec<Checkpoint>, RepositoryError> {
        let inner = self.inner.read().await;
        let mut checkpoints: Vec<Checkpoint> = inner
            .checkpoints
            .values()
            .filter(|cp| cp.route_id == route_id)
            .cloned()
            .collect();
        checkpoints.sort_by_key(|cp| (cp.sequence, cp.id));
        Ok(checkpoints)
    }

    async fn get_checkpoint(
        &self,
        checkpoint_id: CheckpointId,
    ) -> Result<Option<Checkpoint>, RepositoryError> {
        Ok(self.inner.read().await.checkpoints.get(&checkpoint_id).cloned())
    }

    async fn get_route(&self, route_id: RouteId) -> Result<Option<Route>, RepositoryError> {
        Ok(self.inner.read().await.routes.get(&route_id).cloned())
    }

    async fn get_route_configuration(
        &self,
        route_id: RouteId,
    ) -> Result<Option<RouteConfiguration>, RepositoryError> {
        Ok(self.inner.read().await.configurations.get(&route_id).cloned())
    }

    async fn list_route_stamps(
        &self,
        user_id: UserId,
        route_id: RouteId,
    ) -> Result<Vec<Stamp>, RepositoryError> {
        let inner = self.inner.read().await;
        let mut stamps: Vec<Stamp> = inner
            .stamps
            .iter()
            .filter(|s| s.user_id == user_id && s.route_id == route_id)
            .cloned()
            .collect();
        stamps.sort_by_key(|s| (s.stamped_at, s.id));
        Ok(stamps)
    }

    async fn list_stamp_times_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .stamps
            .iter()
            .filter(|s| s.user_id == user_id && s.stamped_at > since)
            .map(|s| s.stamped_at)
            .collect())
    }

    async fn list_user_stamps(&self, user_id: UserId) -> Result<Vec<Stamp>, RepositoryError> {
        let inner = self.inner.read().await;
        let mut stamps: Vec<Stamp> = inner
            .stamps
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        stamps.sort_by_key(|s| (s.stamped_at, s.id));
        Ok(stamps)
    }

    async fn list_code_failures_since(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .code_failures
            .iter()
            .filter(|&&(user, checkpoint, at)| {
                user == user_id && checkpoint == checkpoint_id && at > since
            })
            .map(|&(_, _, at)| at)
            .collect())
    }

    async fn record_code_failure(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.inner
            .write()
            .await
            .code_failures
            .push((user_id, checkpoint_id, at));
        Ok(())
    }

    async fn list_route_rewards(&self, route_id: RouteId) -> Result<Vec<Reward>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .rewards
            .values()
            .filter(|r| r.route_id == route_id && r.is_active)
            .cloned()
            .collect())
    }

    async fn count_issued_vouchers(
        &self,
        route_id: RouteId,
    ) -> Result<HashMap<RewardId, i64>, RepositoryError> {
        let inner = self.inner.read().await;
        let mut counts = HashMap::new();
        for voucher in inner.vouchers.iter().filter(|v| v.route_id == route_id) {
            *counts.entry(voucher.reward_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn list_user_vouchers(&self, user_id: UserId) -> Result<Vec<Voucher>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .vouchers
            .iter()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, RepositoryError> {
        let mut inner = self.inner.write().await;
        if inner
            .vouchers
            .iter()
            .any(|v| v.voucher_code == voucher.voucher_code)
        {
            return Err(RepositoryError::Conflict("voucher already exists".to_owned()));
        }

        inner.last_voucher_id += 1;
        let voucher = voucher.into_voucher(VoucherId::new(inner.last_voucher_id));
        inner.vouchers.push(voucher.clone());
        Ok(voucher)
    }

    async fn find_passport(&self, user_id: UserId) -> Result<Option<Passport>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.passports.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn insert_passport(&self, passport: NewPassport) -> Result<Passport, RepositoryError> {
        let mut inner = self.inner.write().await;
        if inner.passports.iter().any(|p| {
            p.user_id == passport.user_id || p.passport_number == passport.passport_number
        }) {
            return Err(RepositoryError::Conflict(
                "passport already exists".to_owned(),
            ));
        }

        inner.last_passport_id += 1;
        let passport = Passport {
            id: PassportId::new(inner.last_passport_id),
            user_id: passport.user_id,
            passport_number: passport.passport_number,
            created_at: passport.created_at,
        };
        inner.passports.push(passport.clone());
        Ok(passport)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
