//! `PostgreSQL` implementation of [`PassportStore`].
//!
//! Route catalog data (routes, configurations, checkpoint lists, rewards) is
//! managed by administrators and changes rarely, so it is cached with `moka`.
//! Stamps, vouchers and passports are always read from the database.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use tourpass_core::{
    Checkpoint, CheckpointId, GeoPoint, NewPassport, NewStamp, NewVoucher, Passport, PassportId,
    PartnerCode, Reward, RewardId, RewardType, Route, RouteConfiguration, RouteDifficulty,
    RouteId, Stamp, StampId, UserId, ValidationMethod, ValidationMode, Voucher, VoucherId,
};

use super::{RepositoryError, conflict_on_unique};
use crate::store::PassportStore;

const CATALOG_CACHE_CAPACITY: u64 = 1_000;

const CHECKPOINT_COLUMNS: &str = "id, route_id, name, description, latitude, longitude, \
     geofence_radius_meters, validation_mode, partner_code, requires_photo, sequence, \
     reward_points, stamp_fragment_number";

const STAMP_COLUMNS: &str = "id, user_id, checkpoint_id, route_id, stamped_at, photo_url, \
     points_earned, validation_method, latitude, longitude";

const REWARD_COLUMNS: &str = "id, route_id, partner_name, reward_type, description, code_prefix, \
     discount_percentage, partner_address, partner_phone, partner_email, max_vouchers, \
     max_per_user, is_fallback, expires_at, is_active";

const VOUCHER_COLUMNS: &str =
    "id, voucher_code, user_id, reward_id, route_id, is_used, used_at, created_at";

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct RouteRow {
    id: i32,
    name: String,
    difficulty: RouteDifficulty,
    is_active: bool,
}

impl From<RouteRow> for Route {
    fn from(row: RouteRow) -> Self {
        Self {
            id: RouteId::new(row.id),
            name: row.name,
            difficulty: row.difficulty,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RouteConfigurationRow {
    route_id: i32,
    require_sequential: bool,
    stamp_fragments: i32,
    stamp_theme: Option<String>,
}

impl From<RouteConfigurationRow> for RouteConfiguration {
    fn from(row: RouteConfigurationRow) -> Self {
        Self {
            route_id: RouteId::new(row.route_id),
            require_sequential: row.require_sequential,
            stamp_fragments: row.stamp_fragments,
            stamp_theme: row.stamp_theme,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CheckpointRow {
    id: i32,
    route_id: i32,
    name: String,
    description: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    geofence_radius_meters: Option<f64>,
    validation_mode: ValidationMode,
    partner_code: Option<String>,
    requires_photo: bool,
    sequence: i32,
    reward_points: Option<i32>,
    stamp_fragment_number: Option<i32>,
}

impl TryFrom<CheckpointRow> for Checkpoint {
    type Error = RepositoryError;

    fn try_from(row: CheckpointRow) -> Result<Self, Self::Error> {
        let location = decode_location(row.latitude, row.longitude)
            .map_err(|e| corrupt_checkpoint(row.id, &e))?;
        // Blank codes are treated as "no code configured".
        let partner_code = row
            .partner_code
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(PartnerCode::parse)
            .transpose()
            .map_err(|e| corrupt_checkpoint(row.id, &e))?;

        Ok(Self {
            id: CheckpointId::new(row.id),
            route_id: RouteId::new(row.route_id),
            name: row.name,
            description: row.description,
            location,
            geofence_radius_meters: row.geofence_radius_meters,
            validation_mode: row.validation_mode,
            partner_code,
            requires_photo: row.requires_photo,
            sequence: row.sequence,
            reward_points: row.reward_points,
            stamp_fragment_number: row.stamp_fragment_number,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StampRow {
    id: i32,
    user_id: i32,
    checkpoint_id: i32,
    route_id: i32,
    stamped_at: DateTime<Utc>,
    photo_url: Option<String>,
    points_earned: i32,
    validation_method: ValidationMethod,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl TryFrom<StampRow> for Stamp {
    type Error = RepositoryError;

    fn try_from(row: StampRow) -> Result<Self, Self::Error> {
        let location = decode_location(row.latitude, row.longitude).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid location on stamp {}: {e}", row.id))
        })?;

        Ok(Self {
            id: StampId::new(row.id),
            user_id: UserId::new(row.user_id),
            checkpoint_id: CheckpointId::new(row.checkpoint_id),
            route_id: RouteId::new(row.route_id),
            stamped_at: row.stamped_at,
            photo_url: row.photo_url,
            points_earned: row.points_earned,
            validation_method: row.validation_method,
            location,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PassportRow {
    id: i32,
    user_id: i32,
    passport_number: String,
    created_at: DateTime<Utc>,
}

impl From<PassportRow> for Passport {
    fn from(row: PassportRow) -> Self {
        Self {
            id: PassportId::new(row.id),
            user_id: UserId::new(row.user_id),
            passport_number: row.passport_number,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RewardRow {
    id: i32,
    route_id: i32,
    partner_name: String,
    reward_type: RewardType,
    description: String,
    code_prefix: Option<String>,
    discount_percentage: Option<i32>,
    partner_address: Option<String>,
    partner_phone: Option<String>,
    partner_email: Option<String>,
    max_vouchers: Option<i32>,
    max_per_user: i32,
    is_fallback: bool,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl From<RewardRow> for Reward {
    fn from(row: RewardRow) -> Self {
        Self {
            id: RewardId::new(row.id),
            route_id: RouteId::new(row.route_id),
            partner_name: row.partner_name,
            reward_type: row.reward_type,
            description: row.description,
            code_prefix: row.code_prefix.filter(|p| !p.trim().is_empty()),
            discount_percentage: row.discount_percentage,
            partner_address: row.partner_address,
            partner_phone: row.partner_phone,
            partner_email: row.partner_email,
            max_vouchers: row.max_vouchers,
            max_per_user: row.max_per_user,
            is_fallback: row.is_fallback,
            expires_at: row.expires_at,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VoucherRow {
    id: i32,
    voucher_code: String,
    user_id: i32,
    reward_id: i32,
    route_id: i32,
    is_used: bool,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<VoucherRow> for Voucher {
    fn from(row: VoucherRow) -> Self {
        Self {
            id: VoucherId::new(row.id),
            voucher_code: row.voucher_code,
            user_id: UserId::new(row.user_id),
            reward_id: RewardId::new(row.reward_id),
            route_id: RouteId::new(row.route_id),
            is_used: row.is_used,
            used_at: row.used_at,
            created_at: row.created_at,
        }
    }
}

fn decode_location(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Option<GeoPoint>, String> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => GeoPoint::new(lat, lon).map(Some).map_err(|e| e.to_string()),
        (None, None) => Ok(None),
        _ => Err("only one of latitude/longitude is set".to_owned()),
    }
}

fn corrupt_checkpoint(id: i32, err: &impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("invalid checkpoint {id} in database: {err}"))
}

// =============================================================================
// Store
// =============================================================================

/// Passport store backed by the `passport` schema.
#[derive(Clone)]
pub struct PgPassportStore {
    pool: PgPool,
    routes: Cache<RouteId, Route>,
    configurations: Cache<RouteId, Option<RouteConfiguration>>,
    checkpoints: Cache<RouteId, Arc<[Checkpoint]>>,
    rewards: Cache<RouteId, Arc<[Reward]>>,
}

impl PgPassportStore {
    /// Create a store whose catalog cache entries live for `cache_ttl`.
    #[must_use]
    pub fn new(pool: PgPool, cache_ttl: Duration) -> Self {
        Self {
            pool,
            routes: catalog_cache(cache_ttl),
            configurations: catalog_cache(cache_ttl),
            checkpoints: catalog_cache(cache_ttl),
            rewards: catalog_cache(cache_ttl),
        }
    }
}

fn catalog_cache<V: Clone + Send + Sync + 'static>(ttl: Duration) -> Cache<RouteId, V> {
    Cache::builder()
        .max_capacity(CATALOG_CACHE_CAPACITY)
        .time_to_live(ttl)
        .build()
}

impl PassportStore for PgPassportStore {
    #[instrument(skip(self))]
    async fn find_stamp(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
    ) -> Result<Option<Stamp>, RepositoryError> {
        let sql = format!(
            "SELECT {STAMP_COLUMNS} FROM passport.stamps WHERE user_id = $1 AND checkpoint_id = $2"
        );
        sqlx::query_as::<_, StampRow>(&sql)
            .bind(user_id.as_i32())
            .bind(checkpoint_id.as_i32())
            .fetch_optional(&self.pool)
            .await?
            .map(Stamp::try_from)
            .transpose()
    }

    #[instrument(skip(self, stamp), fields(user_id = %stamp.user_id, checkpoint_id = %stamp.checkpoint_id))]
    async fn insert_stamp(&self, stamp: NewStamp) -> Result<Stamp, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO passport.stamps
                (user_id, checkpoint_id, route_id, stamped_at, photo_url, points_earned,
                 validation_method, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {STAMP_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, StampRow>(&sql)
            .bind(stamp.user_id.as_i32())
            .bind(stamp.checkpoint_id.as_i32())
            .bind(stamp.route_id.as_i32())
            .bind(stamp.stamped_at)
            .bind(stamp.photo_url.as_deref())
            .bind(stamp.points_earned)
            .bind(stamp.validation_method)
            .bind(stamp.location.map(|p| p.latitude()))
            .bind(stamp.location.map(|p| p.longitude()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "stamp"))?;

        debug!(stamp_id = row.id, "Stamp inserted");
        Stamp::try_from(row)
    }

    #[instrument(skip(self))]
    async fn list_completed_checkpoint_ids(
        &self,
        user_id: UserId,
        route_id: RouteId,
    ) -> Result<HashSet<CheckpointId>, RepositoryError> {
        let ids: Vec<i32> = sqlx::query_scalar(
            "SELECT checkpoint_id FROM passport.stamps WHERE user_id = $1 AND route_id = $2",
        )
        .bind(user_id.as_i32())
        .bind(route_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(CheckpointId::new).collect())
    }

    #[instrument(skip(self))]
    async fn get_route_checkpoints(
        &self,
        route_id: RouteId,
    ) -> Result<Vec<Checkpoint>, RepositoryError> {
        if let Some(cached) = self.checkpoints.get(&route_id).await {
            debug!("Cache hit for route checkpoints");
            return Ok(cached.to_vec());
        }

        let sql = format!(
            "SELECT {CHECKPOINT_COLUMNS} FROM passport.checkpoints \
             WHERE route_id = $1 ORDER BY sequence, id"
        );
        let checkpoints = sqlx::query_as::<_, CheckpointRow>(&sql)
            .bind(route_id.as_i32())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Checkpoint::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        self.checkpoints
            .insert(route_id, Arc::from(checkpoints.as_slice()))
            .await;
        Ok(checkpoints)
    }

    #[instrument(skip(self))]
    async fn get_checkpoint(
        &self,
        checkpoint_id: CheckpointId,
    ) -> Result<Option<Checkpoint>, RepositoryError> {
        let sql = format!("SELECT {CHECKPOINT_COLUMNS} FROM passport.checkpoints WHERE id = $1");
        sqlx::query_as::<_, CheckpointRow>(&sql)
            .bind(checkpoint_id.as_i32())
            .fetch_optional(&self.pool)
            .await?
            .map(Checkpoint::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn get_route(&self, route_id: RouteId) -> Result<Option<Route>, RepositoryError> {
        if let Some(route) = self.routes.get(&route_id).await {
            debug!("Cache hit for route");
            return Ok(Some(route));
        }

        let route = sqlx::query_as::<_, RouteRow>(
            "SELECT id, name, difficulty, is_active FROM passport.routes WHERE id = $1",
        )
        .bind(route_id.as_i32())
        .fetch_optional(&self.pool)
        .await?
        .map(Route::from);

        if let Some(route) = &route {
            self.routes.insert(route_id, route.clone()).await;
        }
        Ok(route)
    }

    #[instrument(skip(self))]
    async fn get_route_configuration(
        &self,
        route_id: RouteId,
    ) -> Result<Option<RouteConfiguration>, RepositoryError> {
        if let Some(configuration) = self.configurations.get(&route_id).await {
            debug!("Cache hit for route configuration");
            return Ok(configuration);
        }

        let configuration = sqlx::query_as::<_, RouteConfigurationRow>(
            r"
            SELECT route_id, require_sequential, stamp_fragments, stamp_theme
            FROM passport.route_configurations
            WHERE route_id = $1
            ",
        )
        .bind(route_id.as_i32())
        .fetch_optional(&self.pool)
        .await?
        .map(RouteConfiguration::from);

        self.configurations
            .insert(route_id, configuration.clone())
            .await;
        Ok(configuration)
    }

    #[instrument(skip(self))]
    async fn list_route_stamps(
        &self,
        user_id: UserId,
        route_id: RouteId,
    ) -> Result<Vec<Stamp>, RepositoryError> {
        let sql = format!(
            "SELECT {STAMP_COLUMNS} FROM passport.stamps \
             WHERE user_id = $1 AND route_id = $2 ORDER BY stamped_at, id"
        );
        sqlx::query_as::<_, StampRow>(&sql)
            .bind(user_id.as_i32())
            .bind(route_id.as_i32())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Stamp::try_from)
            .collect()
    }

    #[instrument(skip(self))]
    async fn list_stamp_times_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, RepositoryError> {
        let times = sqlx::query_scalar(
            r"
            SELECT stamped_at FROM passport.stamps
            WHERE user_id = $1 AND stamped_at > $2
            ORDER BY stamped_at DESC
            ",
        )
        .bind(user_id.as_i32())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(times)
    }

    #[instrument(skip(self))]
    async fn list_user_stamps(&self, user_id: UserId) -> Result<Vec<Stamp>, RepositoryError> {
        let sql = format!(
            "SELECT {STAMP_COLUMNS} FROM passport.stamps WHERE user_id = $1 ORDER BY stamped_at, id"
        );
        sqlx::query_as::<_, StampRow>(&sql)
            .bind(user_id.as_i32())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Stamp::try_from)
            .collect()
    }

    #[instrument(skip(self))]
    async fn list_code_failures_since(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, RepositoryError> {
        let times = sqlx::query_scalar(
            r"
            SELECT failed_at FROM passport.code_failures
            WHERE user_id = $1 AND checkpoint_id = $2 AND failed_at > $3
            ORDER BY failed_at DESC
            ",
        )
        .bind(user_id.as_i32())
        .bind(checkpoint_id.as_i32())
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(times)
    }

    #[instrument(skip(self))]
    async fn record_code_failure(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO passport.code_failures (user_id, checkpoint_id, failed_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id.as_i32())
        .bind(checkpoint_id.as_i32())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_route_rewards(&self, route_id: RouteId) -> Result<Vec<Reward>, RepositoryError> {
        if let Some(cached) = self.rewards.get(&route_id).await {
            debug!("Cache hit for route rewards");
            return Ok(cached.to_vec());
        }

        let sql = format!(
            "SELECT {REWARD_COLUMNS} FROM passport.rewards \
             WHERE route_id = $1 AND is_active ORDER BY id"
        );
        let rewards: Vec<Reward> = sqlx::query_as::<_, RewardRow>(&sql)
            .bind(route_id.as_i32())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Reward::from)
            .collect();

        self.rewards
            .insert(route_id, Arc::from(rewards.as_slice()))
            .await;
        Ok(rewards)
    }

    #[instrument(skip(self))]
    async fn count_issued_vouchers(
        &self,
        route_id: RouteId,
    ) -> Result<HashMap<RewardId, i64>, RepositoryError> {
        let rows: Vec<(i32, i64)> = sqlx::query_as(
            r"
            SELECT reward_id, COUNT(*) FROM passport.user_rewards
            WHERE route_id = $1
            GROUP BY reward_id
            ",
        )
        .bind(route_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(reward_id, count)| (RewardId::new(reward_id), count))
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_user_vouchers(&self, user_id: UserId) -> Result<Vec<Voucher>, RepositoryError> {
        let sql = format!(
            "SELECT {VOUCHER_COLUMNS} FROM passport.user_rewards \
             WHERE user_id = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, VoucherRow>(&sql)
            .bind(user_id.as_i32())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Voucher::from).collect())
    }

    #[instrument(skip(self, voucher), fields(user_id = %voucher.user_id, reward_id = %voucher.reward_id))]
    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO passport.user_rewards
                (voucher_code, user_id, reward_id, route_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {VOUCHER_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, VoucherRow>(&sql)
            .bind(&voucher.voucher_code)
            .bind(voucher.user_id.as_i32())
            .bind(voucher.reward_id.as_i32())
            .bind(voucher.route_id.as_i32())
            .bind(voucher.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "voucher"))?;

        debug!(voucher_id = row.id, "Voucher issued");
        Ok(Voucher::from(row))
    }

    #[instrument(skip(self))]
    async fn find_passport(&self, user_id: UserId) -> Result<Option<Passport>, RepositoryError> {
        let row = sqlx::query_as::<_, PassportRow>(
            "SELECT id, user_id, passport_number, created_at FROM passport.passports WHERE user_id = $1",
        )
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Passport::from))
    }

    #[instrument(skip(self, passport), fields(user_id = %passport.user_id))]
    async fn insert_passport(&self, passport: NewPassport) -> Result<Passport, RepositoryError> {
        let row = sqlx::query_as::<_, PassportRow>(
            r"
            INSERT INTO passport.passports (user_id, passport_number, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, passport_number, created_at
            ",
        )
        .bind(passport.user_id.as_i32())
        .bind(&passport.passport_number)
        .bind(passport.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "passport"))?;

        Ok(Passport::from(row))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn checkpoint_row() -> CheckpointRow {
        CheckpointRow {
            id: 4,
            route_id: 1,
            name: "Gruta do Lago Azul".to_owned(),
            description: None,
            latitude: Some(-21.1452),
            longitude: Some(-56.5889),
            geofence_radius_meters: Some(80.0),
            validation_mode: ValidationMode::Mixed,
            partner_code: Some(" LAGO-0042 ".to_owned()),
            requires_photo: true,
            sequence: 2,
            reward_points: None,
            stamp_fragment_number: Some(1),
        }
    }

    #[test]
    fn test_checkpoint_row_decodes() {
        let checkpoint = Checkpoint::try_from(checkpoint_row()).unwrap();
        assert_eq!(checkpoint.id, CheckpointId::new(4));
        assert!(checkpoint.location.is_some());
        assert_eq!(checkpoint.partner_code.unwrap().as_str(), "LAGO-0042");
    }

    #[test]
    fn test_blank_partner_code_is_none() {
        let row = CheckpointRow {
            partner_code: Some("   ".to_owned()),
            ..checkpoint_row()
        };
        assert!(Checkpoint::try_from(row).unwrap().partner_code.is_none());
    }

    #[test]
    fn test_half_location_is_corruption() {
        let row = CheckpointRow {
            longitude: None,
            ..checkpoint_row()
        };
        let err = Checkpoint::try_from(row).unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(msg) if msg.contains("checkpoint 4")));
    }

    #[test]
    fn test_blank_reward_prefix_is_none() {
        let row = RewardRow {
            id: 3,
            route_id: 1,
            partner_name: "Pousada Rio Formoso".to_owned(),
            reward_type: RewardType::Gift,
            description: "Welcome drink".to_owned(),
            code_prefix: Some("  ".to_owned()),
            discount_percentage: None,
            partner_address: None,
            partner_phone: None,
            partner_email: None,
            max_vouchers: Some(50),
            max_per_user: 1,
            is_fallback: false,
            expires_at: None,
            is_active: true,
        };
        let reward = Reward::from(row);
        assert_eq!(reward.id, RewardId::new(3));
        assert!(reward.code_prefix.is_none());
    }

    #[test]
    fn test_out_of_range_location_is_corruption() {
        let row = CheckpointRow {
            latitude: Some(123.0),
            ..checkpoint_row()
        };
        assert!(Checkpoint::try_from(row).is_err());
    }
}
