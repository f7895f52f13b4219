//! Which partner rewards a user unlocks on completing a route.
//!
//! A reward is eligible while it is active, unexpired, below its total
//! voucher cap and below its per-user cap. Fallback rewards are consolation
//! prizes: they are handed out only when no regular reward is eligible and
//! the user holds no voucher for the route yet.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{Reward, RewardId, Voucher};

/// Rewards the user should receive a voucher for, in the order given.
///
/// `issued` counts vouchers already issued per reward across all users;
/// `held` is the user's vouchers for the route.
#[must_use]
pub fn select_rewards<'a>(
    rewards: &'a [Reward],
    issued: &HashMap<RewardId, i64>,
    held: &[Voucher],
    now: DateTime<Utc>,
) -> Vec<&'a Reward> {
    let eligible = |reward: &&Reward| {
        let issued_total = issued.get(&reward.id).copied().unwrap_or_default();
        let held_count = held.iter().filter(|v| v.reward_id == reward.id).count();
        reward.is_available(now)
            && reward
                .max_vouchers
                .is_none_or(|cap| issued_total < i64::from(cap))
            && i64::try_from(held_count).unwrap_or(i64::MAX) < i64::from(reward.max_per_user)
    };

    let regular: Vec<&Reward> = rewards
        .iter()
        .filter(|r| !r.is_fallback)
        .filter(eligible)
        .collect();
    if !regular.is_empty() || !held.is_empty() {
        return regular;
    }

    rewards
        .iter()
        .filter(|r| r.is_fallback)
        .filter(eligible)
        .collect()
}
