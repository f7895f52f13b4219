//! Data access for check-ins.
//!
//! [`PassportStore`] is the only seam between the check-in service and
//! storage. [`crate::db::PgPassportStore`] backs production; [`MemoryPassportStore`]
//! backs tests and local tooling. Both enforce one stamp per
//! `(user, checkpoint)` and one voucher per code, and report a duplicate as
//! [`RepositoryError::Conflict`].

mod memory;

use std::collections::{HashMap, HashSet};
use std::future::Future;

use chrono::{DateTime, Utc};

use tourpass_core::{
    Checkpoint, CheckpointId, NewPassport, NewStamp, NewVoucher, Passport, Reward, RewardId,
    Route, RouteConfiguration, RouteId, Stamp, UserId, Voucher,
};

use crate::db::RepositoryError;

pub use memory::MemoryPassportStore;

/// Storage operations the check-in service depends on.
pub trait PassportStore: Send + Sync + 'static {
    /// The user's stamp for a checkpoint, if any.
    fn find_stamp(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
    ) -> impl Future<Output = Result<Option<Stamp>, RepositoryError>> + Send;

    /// Persist a stamp.
    ///
    /// Fails with [`RepositoryError::Conflict`] when the user already holds a
    /// stamp for the checkpoint.
    fn insert_stamp(
        &self,
        stamp: NewStamp,
    ) -> impl Future<Output = Result<Stamp, RepositoryError>> + Send;

    /// Checkpoints of `route_id` the user has stamped.
    fn list_completed_checkpoint_ids(
        &self,
        user_id: UserId,
        route_id: RouteId,
    ) -> impl Future<Output = Result<HashSet<CheckpointId>, RepositoryError>> + Send;

    /// All checkpoints of a route, ordered by sequence position.
    fn get_route_checkpoints(
        &self,
        route_id: RouteId,
    ) -> impl Future<Output = Result<Vec<Checkpoint>, RepositoryError>> + Send;

    fn get_checkpoint(
        &self,
        checkpoint_id: CheckpointId,
    ) -> impl Future<Output = Result<Option<Checkpoint>, RepositoryError>> + Send;

    fn get_route(
        &self,
        route_id: RouteId,
    ) -> impl Future<Output = Result<Option<Route>, RepositoryError>> + Send;

    /// The route's configuration, if one was created.
    fn get_route_configuration(
        &self,
        route_id: RouteId,
    ) -> impl Future<Output = Result<Option<RouteConfiguration>, RepositoryError>> + Send;

    /// The user's stamps on a route, oldest first.
    fn list_route_stamps(
        &self,
        user_id: UserId,
        route_id: RouteId,
    ) -> impl Future<Output = Result<Vec<Stamp>, RepositoryError>> + Send;

    /// Times of the user's stamps (any route) newer than `since`.
    fn list_stamp_times_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<DateTime<Utc>>, RepositoryError>> + Send;

    /// Every stamp the user holds, oldest first.
    fn list_user_stamps(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Stamp>, RepositoryError>> + Send;

    /// Times the user submitted a wrong partner code for a checkpoint, newer than `since`.
    fn list_code_failures_since(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<DateTime<Utc>>, RepositoryError>> + Send;

    fn record_code_failure(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Active rewards of a route, expired ones included.
    fn list_route_rewards(
        &self,
        route_id: RouteId,
    ) -> impl Future<Output = Result<Vec<Reward>, RepositoryError>> + Send;

    /// Vouchers issued so far for each reward of a route, across all users.
    fn count_issued_vouchers(
        &self,
        route_id: RouteId,
    ) -> impl Future<Output = Result<HashMap<RewardId, i64>, RepositoryError>> + Send;

    /// The user's vouchers on every route, oldest first.
    fn list_user_vouchers(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Voucher>, RepositoryError>> + Send;

    /// Persist a voucher.
    ///
    /// Fails with [`RepositoryError::Conflict`] when the code is taken.
    fn insert_voucher(
        &self,
        voucher: NewVoucher,
    ) -> impl Future<Output = Result<Voucher, RepositoryError>> + Send;

    fn find_passport(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Passport>, RepositoryError>> + Send;

    /// Persist a passport.
    ///
    /// Fails with [`RepositoryError::Conflict`] when the user already has a
    /// passport or the number is taken.
    fn insert_passport(
        &self,
        passport: NewPassport,
    ) -> impl Future<Output = Result<Passport, RepositoryError>> + Send;

    /// Cheap connectivity check for the readiness endpoint.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
