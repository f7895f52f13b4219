//! Per-user check-in throttling.
//!
//! Limits how many stamps a user can collect in a sliding window and enforces
//! a cooldown between consecutive check-ins. Both checks look only at the
//! user's own stamp timestamps, so they are pure functions of their inputs.
//!
//! [`CodeAttemptThrottle`] does the same for wrong partner codes, so a user
//! cannot walk the code space of a checkpoint.

use chrono::{DateTime, TimeDelta, Utc};

use crate::checkin::CheckInError;

/// Throttle limits applied before a stamp is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInThrottle {
    /// Maximum stamps per window.
    pub max_per_window: u32,
    /// Sliding window length.
    pub window: TimeDelta,
    /// Minimum time between two consecutive stamps.
    pub cooldown: TimeDelta,
}

impl Default for CheckInThrottle {
    fn default() -> Self {
        Self {
            max_per_window: 10,
            window: TimeDelta::minutes(60),
            cooldown: TimeDelta::seconds(30),
        }
    }
}

impl CheckInThrottle {
    /// Earliest timestamp that still matters to [`Self::check`].
    #[must_use]
    pub fn lookback_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window.max(self.cooldown)
    }

    /// Check `recent` stamp times (any order, may include older entries)
    /// against the limits at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckInError::RateLimited`] when the window is full, or
    /// [`CheckInError::CooldownActive`] when the latest stamp is too recent.
    pub fn check(&self, recent: &[DateTime<Utc>], now: DateTime<Utc>) -> Result<(), CheckInError> {
        let window_start = now - self.window;
        let in_window = recent.iter().filter(|&&t| t > window_start).count();
        if u32::try_from(in_window).unwrap_or(u32::MAX) >= self.max_per_window {
            return Err(CheckInError::RateLimited);
        }

        if let Some(latest) = recent.iter().max() {
            let elapsed = now - *latest;
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                // Round up so clients never retry a moment too early.
                let secs = remaining.num_seconds()
                    + i64::from(remaining.subsec_nanos() > 0);
                return Err(CheckInError::CooldownActive {
                    retry_after_secs: secs.max(1),
                });
            }
        }

        Ok(())
    }
}

/// Limit on wrong partner codes a user may submit for one checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeAttemptThrottle {
    /// Wrong codes tolerated per window.
    pub max_failures: u32,
    /// Sliding window length.
    pub window: TimeDelta,
}

impl Default for CodeAttemptThrottle {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window: TimeDelta::minutes(15),
        }
    }
}

impl CodeAttemptThrottle {
    /// Earliest failure time that still counts.
    #[must_use]
    pub fn lookback_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    /// Check earlier `failures` (any order) before another code is tried.
    ///
    /// # Errors
    ///
    /// Returns [`CheckInError::RateLimited`] once `max_failures` wrong codes
    /// fall inside the window.
    pub fn check(&self, failures: &[DateTime<Utc>], now: DateTime<Utc>) -> Result<(), CheckInError> {
        let window_start = self.lookback_start(now);
        let in_window = failures.iter().filter(|&&t| t > window_start).count();
        if u32::try_from(in_window).unwrap_or(u32::MAX) >= self.max_failures {
            return Err(CheckInError::RateLimited);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap_or_default()
    }

    #[test]
    fn test_empty_history_passes() {
        assert!(CheckInThrottle::default().check(&[], now()).is_ok());
    }

    #[test]
    fn test_cooldown() {
        let throttle = CheckInThrottle::default();
        let recent = [now() - TimeDelta::seconds(10)];
        assert_eq!(
            throttle.check(&recent, now()),
            Err(CheckInError::CooldownActive {
                retry_after_secs: 20
            })
        );

        let recent = [now() - TimeDelta::seconds(30)];
        assert!(throttle.check(&recent, now()).is_ok());
    }

    #[test]
    fn test_cooldown_rounds_up() {
        let throttle = CheckInThrottle::default();
        let recent = [now() - TimeDelta::milliseconds(29_500)];
        assert_eq!(
            throttle.check(&recent, now()),
            Err(CheckInError::CooldownActive { retry_after_secs: 1 })
        );
    }

    #[test]
    fn test_window_limit() {
        let throttle = CheckInThrottle::default();
        let recent: Vec<_> = (1..=10)
            .map(|i| now() - TimeDelta::minutes(i * 5))
            .collect();
        assert_eq!(throttle.check(&recent, now()), Err(CheckInError::RateLimited));
    }

    #[test]
    fn test_old_stamps_ignored() {
        let throttle = CheckInThrottle::default();
        let recent: Vec<_> = (0..10)
            .map(|i| now() - TimeDelta::minutes(61 + i))
            .collect();
        assert!(throttle.check(&recent, now()).is_ok());
    }

    #[test]
    fn test_lookback_start() {
        let throttle = CheckInThrottle::default();
        assert_eq!(throttle.lookback_start(now()), now() - TimeDelta::minutes(60));
    }

    #[test]
    fn test_code_failures_below_limit() {
        let throttle = CodeAttemptThrottle::default();
        let failures: Vec<_> = (1..=4).map(|i| now() - TimeDelta::minutes(i)).collect();
        assert!(throttle.check(&failures, now()).is_ok());
    }

    #[test]
    fn test_code_failures_limit() {
        let throttle = CodeAttemptThrottle::default();
        let failures: Vec<_> = (1..=5).map(|i| now() - TimeDelta::minutes(i)).collect();
        assert_eq!(throttle.check(&failures, now()), Err(CheckInError::RateLimited));

        // The oldest failures age out of the window.
        let later = now() + TimeDelta::minutes(12);
        assert!(throttle.check(&failures, later).is_ok());
    }
}
