//! Partner rewards and the vouchers issued for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RewardId, RouteId, UserId, VoucherId};

/// What a partner offers to visitors who complete a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "passport.reward_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    #[default]
    Discount,
    Gift,
    Experience,
    Other,
}

impl std::fmt::Display for RewardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discount => write!(f, "discount"),
            Self::Gift => write!(f, "gift"),
            Self::Experience => write!(f, "experience"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A partner reward attached to a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub route_id: RouteId,
    pub partner_name: String,
    pub reward_type: RewardType,
    pub description: String,
    /// Prefix of the voucher codes issued for this reward.
    pub code_prefix: Option<String>,
    pub discount_percentage: Option<i32>,
    pub partner_address: Option<String>,
    pub partner_phone: Option<String>,
    pub partner_email: Option<String>,
    /// Vouchers that may be issued in total; `None` is unlimited.
    pub max_vouchers: Option<i32>,
    pub max_per_user: i32,
    /// Only handed out when no regular reward can be.
    pub is_fallback: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Reward {
    /// Active and not expired at `now`.
    #[must_use]
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// A reward issued to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,
    pub voucher_code: String,
    pub user_id: UserId,
    pub reward_id: RewardId,
    pub route_id: RouteId,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Data needed to persist a new voucher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVoucher {
    pub voucher_code: String,
    pub user_id: UserId,
    pub reward_id: RewardId,
    pub route_id: RouteId,
    pub created_at: DateTime<Utc>,
}

impl NewVoucher {
    /// Attach a storage-assigned id, producing an unused voucher.
    #[must_use]
    pub fn into_voucher(self, id: VoucherId) -> Voucher {
        Voucher {
            id,
            voucher_code: self.voucher_code,
            user_id: self.user_id,
            reward_id: self.reward_id,
            route_id: self.route_id,
            is_used: false,
            used_at: None,
            created_at: self.created_at,
        }
    }
}
