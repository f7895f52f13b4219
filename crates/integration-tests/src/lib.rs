//! Integration tests for Tourpass.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (no database needed)
//! cargo test -p tourpass-integration-tests
//!
//! # Smoke tests against a running server
//! PASSPORT_BASE_URL=http://localhost:3002 cargo test -p tourpass-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `check_in_flow` - Check-in service against the in-memory store
//! - `http_api` - Full router with the gateway headers
//! - `live_server` - A deployed server over HTTP (ignored by default)
//!
//! This library holds the fixtures they share: the Bonito route and its
//! partner rewards used by the end-to-end scenario, a store wrapper with stale
//! reads, and the gateway headers.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;

use tourpass_core::{
    CheckInThrottle, Checkpoint, CheckpointId, GeoPoint, NewPassport, NewStamp, NewVoucher,
    Passport, PartnerCode, Reward, RewardId, RewardType, Route, RouteConfiguration,
    RouteDifficulty, RouteId, Stamp, UserId, ValidationMode, Voucher,
};
use tourpass_server::config::CheckInConfig;
use tourpass_server::db::RepositoryError;
use tourpass_server::middleware::ClientIpKeyExtractor;
use tourpass_server::services::CheckInService;
use tourpass_server::state::AppState;
use tourpass_server::store::{MemoryPassportStore, PassportStore};

/// Route of the end-to-end scenario.
pub const BONITO_ROUTE: RouteId = RouteId::new(1);
/// Geofenced first stop, 50 m radius.
pub const RIO_SUCURI: CheckpointId = CheckpointId::new(11);
/// Partner-code second stop.
pub const AQUARIO_NATURAL: CheckpointId = CheckpointId::new(12);
/// Third stop, geofenced and worth a photo.
pub const GRUTA_LAGO_AZUL: CheckpointId = CheckpointId::new(13);

/// Partner code configured on [`AQUARIO_NATURAL`].
pub const BONITO_CODE: &str = "BONITO2025";

/// Discount at a partner restaurant, capped at two vouchers in total.
pub const RESTAURANT_REWARD: RewardId = RewardId::new(21);
/// Souvenir handed out once the restaurant vouchers run out.
pub const SOUVENIR_REWARD: RewardId = RewardId::new(22);

/// Gateway secret used by [`app_state`].
pub const GATEWAY_SECRET: &str = "integration-gateway-secret-Xq7vR2pL9mZ4tK8w";

/// Coordinates of [`RIO_SUCURI`].
#[must_use]
pub fn rio_sucuri_location() -> GeoPoint {
    point(-20.4486, -54.6295)
}

/// Coordinates of [`GRUTA_LAGO_AZUL`].
#[must_use]
pub fn gruta_location() -> GeoPoint {
    point(-21.1447, -56.5886)
}

/// A point `meters` due north of `origin`.
#[must_use]
pub fn north_of(origin: GeoPoint, meters: f64) -> GeoPoint {
    let degrees = meters / (tourpass_core::EARTH_RADIUS_METERS.to_radians());
    point(origin.latitude() + degrees, origin.longitude())
}

#[allow(clippy::unwrap_used)]
fn point(latitude: f64, longitude: f64) -> GeoPoint {
    GeoPoint::new(latitude, longitude).unwrap()
}

/// Fixed instant the service tests start from.
#[must_use]
pub fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_000_000, 0).unwrap_or_default()
}

/// The Bonito route: three sequential checkpoints, each revealing one of
/// three stamp fragments.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn bonito_checkpoints() -> Vec<Checkpoint> {
    let base = Checkpoint {
        id: RIO_SUCURI,
        route_id: BONITO_ROUTE,
        name: "Rio Sucuri".to_owned(),
        description: Some("Flutuação no rio de águas cristalinas".to_owned()),
        location: Some(rio_sucuri_location()),
        geofence_radius_meters: Some(50.0),
        validation_mode: ValidationMode::Geofence,
        partner_code: None,
        requires_photo: false,
        sequence: 1,
        reward_points: None,
        stamp_fragment_number: Some(1),
    };

    vec![
        base.clone(),
        Checkpoint {
            id: AQUARIO_NATURAL,
            name: "Aquário Natural".to_owned(),
            description: None,
            location: None,
            geofence_radius_meters: None,
            validation_mode: ValidationMode::Code,
            partner_code: Some(PartnerCode::parse(BONITO_CODE).unwrap()),
            sequence: 2,
            stamp_fragment_number: Some(2),
            ..base.clone()
        },
        Checkpoint {
            id: GRUTA_LAGO_AZUL,
            name: "Gruta do Lago Azul".to_owned(),
            description: None,
            location: Some(gruta_location()),
            geofence_radius_meters: Some(120.0),
            requires_photo: true,
            sequence: 3,
            reward_points: Some(50),
            stamp_fragment_number: Some(3),
            ..base
        },
    ]
}

/// Load the Bonito route into a memory store.
pub async fn seed_bonito_route(store: &MemoryPassportStore) {
    store
        .put_route(Route {
            id: BONITO_ROUTE,
            name: "Circuito Bonito".to_owned(),
            difficulty: RouteDifficulty::Medium,
            is_active: true,
        })
        .await;
    store
        .put_route_configuration(RouteConfiguration {
            route_id: BONITO_ROUTE,
            require_sequential: true,
            stamp_fragments: 3,
            stamp_theme: Some("tuiuiu".to_owned()),
        })
        .await;
    for checkpoint in bonito_checkpoints() {
        store.put_checkpoint(checkpoint).await;
    }
}

/// Partner rewards of the Bonito route: one regular reward limited to two
/// vouchers and one fallback.
#[must_use]
pub fn bonito_rewards() -> Vec<Reward> {
    let restaurant = Reward {
        id: RESTAURANT_REWARD,
        route_id: BONITO_ROUTE,
        partner_name: "Restaurante Casa do João".to_owned(),
        reward_type: RewardType::Discount,
        description: "15% de desconto no almoço".to_owned(),
        code_prefix: Some("JOAO".to_owned()),
        discount_percentage: Some(15),
        partner_address: Some("Rua Nestor Fernandes, 640".to_owned()),
        partner_phone: None,
        partner_email: None,
        max_vouchers: Some(2),
        max_per_user: 1,
        is_fallback: false,
        expires_at: None,
        is_active: true,
    };

    vec![
        restaurant.clone(),
        Reward {
            id: SOUVENIR_REWARD,
            partner_name: "Centro de Atendimento ao Turista".to_owned(),
            reward_type: RewardType::Gift,
            description: "Adesivo do tuiuiú".to_owned(),
            code_prefix: None,
            discount_percentage: None,
            partner_address: None,
            max_vouchers: None,
            is_fallback: true,
            ..restaurant
        },
    ]
}

/// Load the Bonito partner rewards into a memory store.
pub async fn seed_bonito_rewards(store: &MemoryPassportStore) {
    for reward in bonito_rewards() {
        store.put_reward(reward).await;
    }
}

/// A memory store holding the Bonito route.
pub async fn bonito_store() -> MemoryPassportStore {
    let store = MemoryPassportStore::new();
    seed_bonito_route(&store).await;
    store
}

/// Check-in settings with the cooldown disabled, for flows driven by the
/// wall clock.
#[must_use]
pub fn no_cooldown_config() -> CheckInConfig {
    CheckInConfig {
        throttle: CheckInThrottle {
            cooldown: TimeDelta::zero(),
            ..CheckInThrottle::default()
        },
        ..CheckInConfig::default()
    }
}

/// Router state over `store` using [`GATEWAY_SECRET`], keyed on the peer address.
pub fn app_state<S: PassportStore>(store: S, config: CheckInConfig) -> AppState<S> {
    AppState::new(
        CheckInService::new(store, config),
        SecretString::from(GATEWAY_SECRET),
        ClientIpKeyExtractor::peer(),
    )
}

/// Store whose stamp reads lag behind its writes.
///
/// Models a second request that read the user's stamps before a concurrent
/// request committed: the service's pre-check passes and only the storage
/// uniqueness constraint catches the duplicate.
#[derive(Debug, Default)]
pub struct StaleReadStore {
    pub inner: MemoryPassportStore,
}

impl PassportStore for StaleReadStore {
    async fn find_stamp(
        &self,
        _user_id: UserId,
        _checkpoint_id: CheckpointId,
    ) -> Result<Option<Stamp>, RepositoryError> {
        Ok(None)
    }

    async fn insert_stamp(&self, stamp: NewStamp) -> Result<Stamp, RepositoryError> {
        self.inner.insert_stamp(stamp).await
    }

    async fn list_completed_checkpoint_ids(
        &self,
        _user_id: UserId,
        _route_id: RouteId,
    ) -> Result<HashSet<CheckpointId>, RepositoryError> {
        Ok(HashSet::new())
    }

    async fn get_route_checkpoints(
        &self,
        route_id: RouteId,
    ) -> Result<Vec<Checkpoint>, RepositoryError> {
        self.inner.get_route_checkpoints(route_id).await
    }

    async fn get_checkpoint(
        &self,
        checkpoint_id: CheckpointId,
    ) -> Result<Option<Checkpoint>, RepositoryError> {
        self.inner.get_checkpoint(checkpoint_id).await
    }

    async fn get_route(&self, route_id: RouteId) -> Result<Option<Route>, RepositoryError> {
        self.inner.get_route(route_id).await
    }

    async fn get_route_configuration(
        &self,
        route_id: RouteId,
    ) -> Result<Option<RouteConfiguration>, RepositoryError> {
        self.inner.get_route_configuration(route_id).await
    }

    async fn list_route_stamps(
        &self,
        user_id: UserId,
        route_id: RouteId,
    ) -> Result<Vec<Stamp>, RepositoryError> {
        self.inner.list_route_stamps(user_id, route_id).await
    }

    async fn list_stamp_times_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, RepositoryError> {
        self.inner.list_stamp_times_since(user_id, since).await
    }

    async fn list_user_stamps(&self, user_id: UserId) -> Result<Vec<Stamp>, RepositoryError> {
        self.inner.list_user_stamps(user_id).await
    }

    async fn list_code_failures_since(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, RepositoryError> {
        self.inner
            .list_code_failures_since(user_id, checkpoint_id, since)
            .await
    }

    async fn record_code_failure(
        &self,
        user_id: UserId,
        checkpoint_id: CheckpointId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.inner
            .record_code_failure(user_id, checkpoint_id, at)
            .await
    }

    async fn list_route_rewards(&self, route_id: RouteId) -> Result<Vec<Reward>, RepositoryError> {
        self.inner.list_route_rewards(route_id).await
    }

    async fn count_issued_vouchers(
        &self,
        route_id: RouteId,
    ) -> Result<HashMap<RewardId, i64>, RepositoryError> {
        self.inner.count_issued_vouchers(route_id).await
    }

    async fn list_user_vouchers(&self, user_id: UserId) -> Result<Vec<Voucher>, RepositoryError> {
        self.inner.list_user_vouchers(user_id).await
    }

    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, RepositoryError> {
        self.inner.insert_voucher(voucher).await
    }

    async fn find_passport(&self, user_id: UserId) -> Result<Option<Passport>, RepositoryError> {
        self.inner.find_passport(user_id).await
    }

    async fn insert_passport(&self, passport: NewPassport) -> Result<Passport, RepositoryError> {
        self.inner.insert_passport(passport).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
