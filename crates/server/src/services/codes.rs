//! Random identifiers handed out to people: passport numbers, partner codes
//! and voucher codes.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;

/// Prefix used for passport numbers.
pub const DEFAULT_PASSPORT_PREFIX: &str = "MS";

const SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PASSPORT_SUFFIX_LENGTH: usize = 6;
const VOUCHER_SUFFIX_LENGTH: usize = 8;

/// Prefix used for vouchers of rewards that configure none.
pub const DEFAULT_VOUCHER_PREFIX: &str = "TOUR";

/// Generate a passport number: `<PREFIX>-<base36 millis>-<6 uppercase alphanumerics>`.
///
/// Uniqueness is enforced by storage; callers retry on conflict.
#[must_use]
pub fn generate_passport_number(prefix: &str, now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    let mut rng = rand::rng();
    let suffix: String = (0..PASSPORT_SUFFIX_LENGTH)
        .filter_map(|_| SUFFIX_CHARSET.choose(&mut rng))
        .map(|&b| char::from(b))
        .collect();

    format!("{prefix}-{}-{suffix}", to_base36_upper(millis))
}

/// Generate a partner code for a checkpoint: `<PREFIX>-NNNN`.
#[must_use]
pub fn generate_partner_code(prefix: &str) -> String {
    let number: u16 = rand::rng().random_range(0..10_000);
    format!("{}-{number:04}", prefix.trim().to_uppercase())
}

/// Generate a voucher code: `<PREFIX>-<8 uppercase alphanumerics>`.
///
/// Uniqueness is enforced by storage; callers retry on conflict.
#[must_use]
pub fn generate_voucher_code(prefix: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..VOUCHER_SUFFIX_LENGTH)
        .filter_map(|_| SUFFIX_CHARSET.choose(&mut rng))
        .map(|&b| char::from(b))
        .collect();
    format!("{}-{suffix}", prefix.trim().to_uppercase())
}

fn to_base36_upper(mut value: u64) -> String {
    if value == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while value > 0 {
        #[allow(clippy::cast_possible_truncation)] // remainder is < 36
        let digit = (value % 36) as u32;
        digits.extend(char::from_digit(digit, 36).map(|c| c.to_ascii_uppercase()));
        value /= 36;
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base36() {
        assert_eq!(to_base36_upper(0), "0");
        assert_eq!(to_base36_upper(35), "Z");
        assert_eq!(to_base36_upper(36), "10");
        assert_eq!(to_base36_upper(1_760_000_000_000), "MGJ6K3CW");
    }

    #[test]
    fn test_passport_number_format() {
        let now = DateTime::from_timestamp_millis(1_760_000_000_000).unwrap();
        let number = generate_passport_number(DEFAULT_PASSPORT_PREFIX, now);

        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.first(), Some(&"MS"));
        assert_eq!(parts.get(1), Some(&"MGJ6K3CW"));
        let suffix = parts.get(2).unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_partner_code_format() {
        for _ in 0..50 {
            let code = generate_partner_code("ms");
            let (prefix, digits) = code.split_once('-').unwrap();
            assert_eq!(prefix, "MS");
            assert_eq!(digits.len(), 4);
            assert!(digits.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_voucher_code_format() {
        let code = generate_voucher_code(" bonito ");
        let (prefix, suffix) = code.split_once('-').unwrap();
        assert_eq!(prefix, "BONITO");
        assert_eq!(suffix.len(), 8);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }
}
