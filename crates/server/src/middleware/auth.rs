//! Caller identity extractor.
//!
//! Authentication happens upstream in the API gateway, which forwards the
//! authenticated user in `x-user-id` and proves itself with
//! `x-gateway-secret`. The user header is ignored unless the secret matches.

use axum::{extract::FromRequestParts, http::request::Parts};

use tourpass_core::UserId;

use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;
use crate::store::PassportStore;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the gateway's shared secret.
pub const GATEWAY_SECRET_HEADER: &str = "x-gateway-secret";

/// Extractor that requires a gateway-authenticated user.
///
/// # Example
///
/// ```rust,ignore
/// async fn passport(RequireUser(user_id): RequireUser) -> impl IntoResponse {
///     format!("Hello, user {user_id}!")
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireUser(pub UserId);

impl<S: PassportStore> FromRequestParts<AppState<S>> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let secret = header_str(parts, GATEWAY_SECRET_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing gateway credentials".to_owned()))?;
        if !state.gateway_secret_matches(secret) {
            tracing::warn!("Rejected request with invalid gateway secret");
            return Err(AppError::Unauthorized(
                "invalid gateway credentials".to_owned(),
            ));
        }

        let user_id = header_str(parts, USER_ID_HEADER)
            .and_then(|v| v.trim().parse::<i32>().ok())
            .filter(|id| *id > 0)
            .map(UserId::new)
            .ok_or_else(|| AppError::Unauthorized("missing or invalid user id".to_owned()))?;

        tracing::Span::current().record("user_id", user_id.as_i32());
        set_sentry_user(&user_id);

        Ok(Self(user_id))
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}
