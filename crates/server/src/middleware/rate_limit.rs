//! Per-IP rate limiting for check-in endpoints using governor and `tower_governor`.
//!
//! This complements the per-user limits applied by the check-in service:
//! the service limits stamps and wrong partner codes per user, the limiter caps
//! raw request volume per client address.
//!
//! The client address is the TCP peer unless proxy headers are trusted. Only
//! trust them when a proxy in front of the server overwrites them, otherwise
//! any client can pick its own key.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use thiserror::Error;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Seconds to replenish one request token.
const REPLENISH_SECONDS: u64 = 2;
/// Requests a client may burst before being limited.
const BURST_SIZE: u32 = 10;

/// Error building the limiter from its constants.
#[derive(Debug, Error)]
#[error("invalid rate limiter configuration")]
pub struct RateLimitConfigError;

/// Key extractor keyed on the peer address, or on proxy headers when trusted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientIpKeyExtractor {
    trust_proxy_headers: bool,
}

impl ClientIpKeyExtractor {
    /// Key on the TCP peer address only.
    #[must_use]
    pub const fn peer() -> Self {
        Self {
            trust_proxy_headers: false,
        }
    }

    /// Prefer `x-forwarded-for`, then `x-real-ip`, then the peer address.
    #[must_use]
    pub const fn behind_proxy() -> Self {
        Self {
            trust_proxy_headers: true,
        }
    }

    fn proxy_header_ip<T>(req: &Request<T>) -> Option<IpAddr> {
        let headers = req.headers();

        // X-Forwarded-For (first IP in the chain)
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<IpAddr>().ok())
            })
    }
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        if self.trust_proxy_headers
            && let Some(ip) = Self::proxy_header_ip(req)
        {
            return Ok(ip);
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create the limiter for check-in endpoints: one token every 2 seconds, burst of 10.
///
/// # Errors
///
/// Returns `RateLimitConfigError` if governor rejects the quota.
pub fn check_in_rate_limiter(
    key_extractor: ClientIpKeyExtractor,
) -> Result<RateLimiterLayer, RateLimitConfigError> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(key_extractor)
        .per_second(REPLENISH_SECONDS)
        .burst_size(BURST_SIZE)
        .finish()
        .ok_or(RateLimitConfigError)?;
    Ok(GovernorLayer::new(Arc::new(config)))
}
