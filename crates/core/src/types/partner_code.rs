//! Partner code type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PartnerCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PartnerCodeError {
    /// The input is empty or only whitespace.
    #[error("partner code cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("partner code must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A code issued by a physical partner location.
///
/// Codes are opaque. Matching is case-insensitive and ignores whitespace
/// around the supplied value; interior whitespace is significant.
///
/// The `Debug` implementation redacts the value so codes never end up in logs.
///
/// ## Examples
///
/// ```
/// use tourpass_core::PartnerCode;
///
/// let code = PartnerCode::parse("BONITO2025").unwrap();
/// assert!(code.matches("  bonito2025 "));
/// assert!(!code.matches("BONITO 2025"));
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PartnerCode(String);

impl PartnerCode {
    /// Maximum length of a partner code.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a `PartnerCode`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than 64 characters.
    pub fn parse(s: &str) -> Result<Self, PartnerCodeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PartnerCodeError::Empty);
        }
        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(PartnerCodeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns `true` if `supplied` equals this code, ignoring ASCII case and
    /// surrounding whitespace.
    #[must_use]
    pub fn matches(&self, supplied: &str) -> bool {
        supplied.trim().eq_ignore_ascii_case(&self.0)
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PartnerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PartnerCode([REDACTED])")
    }
}

impl TryFrom<String> for PartnerCode {
    type Error = PartnerCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PartnerCode> for String {
    fn from(code: PartnerCode) -> Self {
        code.0
    }
}

impl std::str::FromStr for PartnerCode {
    type Err = PartnerCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
