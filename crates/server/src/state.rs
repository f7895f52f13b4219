//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::middleware::ClientIpKeyExtractor;
use crate::services::CheckInService;
use crate::store::PassportStore;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; generic over the store so the same router
/// serves `PostgreSQL` in production and memory in tests.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    service: CheckInService<S>,
    gateway_secret: SecretString,
    client_ip: ClientIpKeyExtractor,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: PassportStore> AppState<S> {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `service` - Check-in service over the chosen store
    /// * `gateway_secret` - Secret expected in the `x-gateway-secret` header
    /// * `client_ip` - How the IP rate limiter identifies clients
    #[must_use]
    pub fn new(
        service: CheckInService<S>,
        gateway_secret: SecretString,
        client_ip: ClientIpKeyExtractor,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                service,
                gateway_secret,
                client_ip,
            }),
        }
    }

    /// Get a reference to the check-in service.
    #[must_use]
    pub fn service(&self) -> &CheckInService<S> {
        &self.inner.service
    }

    /// Get a reference to the passport store.
    #[must_use]
    pub fn store(&self) -> &S {
        self.inner.service.store()
    }

    /// Key extractor for the IP rate limiter.
    #[must_use]
    pub fn client_ip(&self) -> ClientIpKeyExtractor {
        self.inner.client_ip
    }

    /// Compare a presented gateway secret in constant time.
    #[must_use]
    pub fn gateway_secret_matches(&self, presented: &str) -> bool {
        let expected = self.inner.gateway_secret.expose_secret().as_bytes();
        expected.ct_eq(presented.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckInConfig;
    use crate::store::MemoryPassportStore;

    #[test]
    fn test_gateway_secret_matches() {
        let service = CheckInService::new(MemoryPassportStore::new(), CheckInConfig::default());
        let state = AppState::new(
            service,
            SecretString::from("s3cr3t-Gw"),
            ClientIpKeyExtractor::peer(),
        );

        assert!(state.gateway_secret_matches("s3cr3t-Gw"));
        assert!(!state.gateway_secret_matches("s3cr3t-GW"));
        assert!(!state.gateway_secret_matches("s3cr3t"));
        assert!(!state.gateway_secret_matches(""));
    }
}
