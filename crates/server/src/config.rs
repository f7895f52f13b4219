//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PASSPORT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `PASSPORT_GATEWAY_SECRET` - Shared secret the API gateway sends in `x-gateway-secret`
//!
//! ## Optional
//! - `PASSPORT_HOST` - Bind address (default: 127.0.0.1)
//! - `PASSPORT_PORT` - Listen port (default: 3002)
//! - `PASSPORT_MIXED_MODE` - `proximity` or `proximity_and_code` (default: proximity)
//! - `PASSPORT_CHECKIN_MAX_PER_WINDOW` - Stamps allowed per window (default: 10)
//! - `PASSPORT_CHECKIN_WINDOW_MINUTES` - Throttle window length (default: 60)
//! - `PASSPORT_CHECKIN_COOLDOWN_SECS` - Minimum gap between stamps (default: 30)
//! - `PASSPORT_CODE_MAX_FAILURES` - Wrong partner codes allowed per checkpoint and window (default: 5)
//! - `PASSPORT_CODE_FAILURE_WINDOW_MINUTES` - Wrong code window length (default: 15)
//! - `PASSPORT_TRUST_PROXY_HEADERS` - Key the IP limiter on `x-forwarded-for`/`x-real-ip`
//!   instead of the peer address; only enable behind a proxy that sets them (default: false)
//! - `PASSPORT_CATALOG_CACHE_SECS` - Route catalog cache TTL (default: 300)
//! - `PASSPORT_LOG_FORMAT` - `text` or `json` (default: text)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance traces sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use secrecy::SecretString;
use thiserror::Error;

use tourpass_core::{CheckInThrottle, CodeAttemptThrottle, MixedModePolicy};

const MIN_GATEWAY_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Passport server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Secret that proves a request came through the API gateway
    pub gateway_secret: SecretString,
    /// Check-in policy knobs
    pub check_in: CheckInConfig,
    /// Take the client address from proxy headers
    pub trust_proxy_headers: bool,
    /// How long route catalog lookups stay cached
    pub catalog_cache_ttl: Duration,
    /// Emit logs as JSON lines instead of text
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. production, staging)
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Check-in policy configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckInConfig {
    /// Whether mixed-mode checkpoints also demand the partner code.
    pub mixed_policy: MixedModePolicy,
    /// Per-user stamp throttling.
    pub throttle: CheckInThrottle,
    /// Per-user limit on wrong partner codes.
    pub code_attempts: CodeAttemptThrottle,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the gateway secret fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("PASSPORT_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("PASSPORT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("PASSPORT_PORT", "3002")?;
        let gateway_secret = get_validated_secret("PASSPORT_GATEWAY_SECRET")?;
        validate_secret_length(&gateway_secret, "PASSPORT_GATEWAY_SECRET")?;

        let check_in = CheckInConfig::from_env()?;
        let trust_proxy_headers =
            parse_env_or_default::<bool>("PASSPORT_TRUST_PROXY_HEADERS", "false")?;
        let catalog_cache_ttl = Duration::from_secs(parse_env_or_default::<u64>(
            "PASSPORT_CATALOG_CACHE_SECS",
            "300",
        )?);
        let log_json = match get_env_or_default("PASSPORT_LOG_FORMAT", "text").as_str() {
            "json" => true,
            "text" => false,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "PASSPORT_LOG_FORMAT".to_string(),
                    format!("expected 'text' or 'json', got '{other}'"),
                ));
            }
        };

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = parse_env_or_default::<f32>("SENTRY_SAMPLE_RATE", "1.0")?;
        let sentry_traces_sample_rate =
            parse_env_or_default::<f32>("SENTRY_TRACES_SAMPLE_RATE", "0.0")?;

        Ok(Self {
            database_url,
            host,
            port,
            gateway_secret,
            check_in,
            trust_proxy_headers,
            catalog_cache_ttl,
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CheckInConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = CheckInThrottle::default();
        let code_defaults = CodeAttemptThrottle::default();

        let mixed_policy =
            parse_env_or_default::<MixedModePolicy>("PASSPORT_MIXED_MODE", "proximity")?;
        let max_per_window = get_optional_env("PASSPORT_CHECKIN_MAX_PER_WINDOW")
            .map(|v| parse_value::<u32>("PASSPORT_CHECKIN_MAX_PER_WINDOW", &v))
            .transpose()?
            .unwrap_or(defaults.max_per_window);
        let window = get_duration_env(
            "PASSPORT_CHECKIN_WINDOW_MINUTES",
            TimeDelta::try_minutes,
            defaults.window,
        )?;
        let cooldown = get_duration_env(
            "PASSPORT_CHECKIN_COOLDOWN_SECS",
            TimeDelta::try_seconds,
            defaults.cooldown,
        )?;

        let max_failures = get_optional_env("PASSPORT_CODE_MAX_FAILURES")
            .map(|v| parse_value::<u32>("PASSPORT_CODE_MAX_FAILURES", &v))
            .transpose()?
            .unwrap_or(code_defaults.max_failures);
        let failure_window = get_duration_env(
            "PASSPORT_CODE_FAILURE_WINDOW_MINUTES",
            TimeDelta::try_minutes,
            code_defaults.window,
        )?;

        if window <= TimeDelta::zero() {
            return Err(ConfigError::InvalidEnvVar(
                "PASSPORT_CHECKIN_WINDOW_MINUTES".to_string(),
                "must be positive".to_string(),
            ));
        }
        if cooldown < TimeDelta::zero() {
            return Err(ConfigError::InvalidEnvVar(
                "PASSPORT_CHECKIN_COOLDOWN_SECS".to_string(),
                "must not be negative".to_string(),
            ));
        }
        if max_failures == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PASSPORT_CODE_MAX_FAILURES".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if failure_window <= TimeDelta::zero() {
            return Err(ConfigError::InvalidEnvVar(
                "PASSPORT_CODE_FAILURE_WINDOW_MINUTES".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            mixed_policy,
            throttle: CheckInThrottle {
                max_per_window,
                window,
                cooldown,
            },
            code_attempts: CodeAttemptThrottle {
                max_failures,
                window: failure_window,
            },
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

/// Read an integer duration, converting it with `unit` (e.g. `TimeDelta::try_minutes`).
fn get_duration_env(
    key: &str,
    unit: fn(i64) -> Option<TimeDelta>,
    default: TimeDelta,
) -> Result<TimeDelta, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let value = parse_value::<i64>(key, &raw)?;
    unit(value).ok_or_else(|| ConfigError::InvalidEnvVar(key.to_string(), "out of range".into()))
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    use secrecy::ExposeSecret;

    let value = secret.expose_secret();
    if value.len() < MIN_GATEWAY_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_GATEWAY_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
