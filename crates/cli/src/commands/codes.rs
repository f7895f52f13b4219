//! Partner code generation for administrators.
//!
//! # Usage
//!
//! ```bash
//! tp-cli partner-code --prefix BONITO --count 5
//! ```

use tourpass_server::services::generate_partner_code;

/// Generate `count` partner codes with `prefix`.
#[must_use]
pub fn partner_codes(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|_| generate_partner_code(prefix)).collect()
}

/// Print `count` partner codes, one per line.
pub fn print_partner_codes(prefix: &str, count: usize) {
    #[allow(clippy::print_stdout)]
    {
        for code in partner_codes(prefix, count) {
            println!("{code}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partner_codes_count_and_prefix() {
        let codes = partner_codes("lago", 3);
        assert_eq!(codes.len(), 3);
        assert!(codes.iter().all(|c| c.starts_with("LAGO-")));
    }
}
