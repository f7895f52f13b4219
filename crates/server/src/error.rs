//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`.
//!
//! Responses are JSON: `{ "error": kind, "message": text, ... }` with extra
//! fields for rejections that carry data (blockers, distance, retry delay).

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use thiserror::Error;

use tourpass_core::CheckInError;

use crate::db::RepositoryError;
use crate::services::ServiceError;

/// Application-level error type for the passport server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Check-in evaluation rejected the attempt.
    #[error("{0}")]
    CheckIn(#[from] CheckInError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller identity missing or not trusted.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::CheckIn(e) => Self::CheckIn(e),
            ServiceError::CheckpointNotFound(id) => Self::NotFound(format!("checkpoint {id}")),
            ServiceError::RouteNotFound(id) => Self::NotFound(format!("route {id}")),
            ServiceError::Repository(RepositoryError::NotFound) => {
                Self::NotFound("resource".to_owned())
            }
            ServiceError::Repository(e) => Self::Database(e),
        }
    }
}

impl AppError {
    /// Returns `true` for failures caused by the server rather than the caller.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Internal(_) => true,
            Self::CheckIn(e) => e.is_configuration(),
            _ => false,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CheckIn(e) => match e {
                CheckInError::Locked { .. } => StatusCode::LOCKED,
                CheckInError::AlreadyCompleted => StatusCode::CONFLICT,
                CheckInError::OutOfRange { .. }
                | CheckInError::InvalidCode
                | CheckInError::CodeRequired
                | CheckInError::LocationRequired
                | CheckInError::PhotoRequired => StatusCode::UNPROCESSABLE_ENTITY,
                CheckInError::RateLimited | CheckInError::CooldownActive { .. } => {
                    StatusCode::TOO_MANY_REQUESTS
                }
                CheckInError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Internal(_) => "internal",
            Self::CheckIn(e) => e.kind(),
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
        }
    }

    fn body(&self) -> Value {
        // Don't expose internal error details to clients
        let message = if self.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = Map::new();
        body.insert("error".to_owned(), json!(self.kind()));
        body.insert("message".to_owned(), json!(message));

        if let Self::CheckIn(e) = self {
            match e {
                CheckInError::Locked { blocked_by } => {
                    body.insert("blocked_by".to_owned(), json!(blocked_by));
                }
                CheckInError::OutOfRange {
                    distance_meters,
                    required_radius_meters,
                } => {
                    body.insert("distance_meters".to_owned(), json!(distance_meters.round()));
                    body.insert(
                        "required_radius_meters".to_owned(),
                        json!(required_radius_meters),
                    );
                }
                CheckInError::CooldownActive { retry_after_secs } => {
                    body.insert("retry_after_secs".to_owned(), json!(retry_after_secs));
                }
                _ => {}
            }
        }

        Value::Object(body)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut response = (self.status(), Json(self.body())).into_response();

        if let Self::CheckIn(CheckInError::CooldownActive { retry_after_secs }) = &self
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }

        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tourpass_core::CheckpointId;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("checkpoint 4".to_string());
        assert_eq!(err.to_string(), "Not found: checkpoint 4");

        let err = AppError::CheckIn(CheckInError::InvalidCode);
        assert_eq!(err.to_string(), "invalid partner code");
    }

    #[test]
    fn test_check_in_status_codes() {
        let cases = [
            (
                CheckInError::Locked {
                    blocked_by: vec![CheckpointId::new(1)],
                },
                StatusCode::LOCKED,
            ),
            (CheckInError::AlreadyCompleted, StatusCode::CONFLICT),
            (
                CheckInError::OutOfRange {
                    distance_meters: 340.2,
                    required_radius_meters: 50.0,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (CheckInError::InvalidCode, StatusCode::UNPROCESSABLE_ENTITY),
            (CheckInError::PhotoRequired, StatusCode::UNPROCESSABLE_ENTITY),
            (CheckInError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (
                CheckInError::Configuration("bad".to_owned()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::CheckIn(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_out_of_range_body() {
        let err = AppError::CheckIn(CheckInError::OutOfRange {
            distance_meters: 340.4,
            required_radius_meters: 50.0,
        });
        let body = err.body();
        assert_eq!(body["error"], "out_of_range");
        assert_eq!(body["distance_meters"], 340.0);
        assert_eq!(body["required_radius_meters"], 50.0);
        assert_eq!(body["message"], "you are 340m away, need to be within 50m");
    }

    #[test]
    fn test_configuration_details_hidden() {
        let err = AppError::CheckIn(CheckInError::Configuration(
            "checkpoint 3 has no coordinates".to_owned(),
        ));
        assert!(err.is_server_error());
        let body = err.body();
        assert_eq!(body["error"], "configuration");
        assert_eq!(body["message"], "Internal server error");
    }

    #[test]
    fn test_cooldown_sets_retry_after() {
        let response =
            AppError::CheckIn(CheckInError::CooldownActive { retry_after_secs: 12 })
                .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "12"
        );
    }

    #[test]
    fn test_service_error_mapping() {
        let err = AppError::from(ServiceError::CheckpointNotFound(CheckpointId::new(9)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = AppError::from(ServiceError::Repository(RepositoryError::Conflict(
            "x".to_owned(),
        )));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
