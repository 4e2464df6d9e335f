//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Every failure the session and rate-limiting core can produce maps onto exactly one variant,
//! and every variant maps onto one HTTP status plus a stable machine-readable `code`.
//!
//! `AppError` implements `actix_web::error::ResponseError` so handlers, extractors and middleware
//! can return it directly. Response bodies are always JSON of the form
//! `{"error": "<generic message>", "code": "<code>"}`. The detail carried inside a variant
//! (which token check failed, what the database said) is for the logs only and never reaches
//! the client.

use actix_web::{
    error::ResponseError,
    http::{header, StatusCode},
    HttpResponse,
};
use log::error;
use serde_json::json;
use validator::ValidationErrors;

use crate::ratelimit::RateDecision;
use crate::store::StoreError;

/// Represents all possible errors that can occur within the application.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Unknown username, wrong password or disabled account at token issuance (HTTP 401).
    /// The three cases are deliberately indistinguishable to the caller.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// No such token, a missing/malformed `Authorization` header, or an orphaned token (HTTP 401).
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// The token exists but is deactivated, expired or failed the exact-match re-check (HTTP 401).
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// The client exhausted its request budget for the current window (HTTP 429).
    #[error("rate limited: {} of {} remaining", .0.remaining, .0.limit)]
    RateLimited(RateDecision),
    /// A stored password secret could not be parsed (HTTP 500).
    #[error("corrupt credential: {0}")]
    CorruptCredential(String),
    /// Username collision at registration (HTTP 400).
    #[error("duplicate user")]
    DuplicateUser,
    /// Malformed or unacceptable request (HTTP 400).
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// Input failed field validation (HTTP 422 Unprocessable Entity).
    #[error("Validation Error: {0}")]
    ValidationError(String),
    /// A backing store could not be reached (HTTP 503).
    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),
    /// Any other unexpected server-side failure (HTTP 500).
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
}

impl AppError {
    /// Stable machine-readable identifier placed in the `code` field of error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::RateLimited(_) => "rate_limited",
            AppError::CorruptCredential(_) => "corrupt_credential",
            AppError::DuplicateUser => "duplicate_user",
            AppError::BadRequest(_) => "bad_request",
            AppError::ValidationError(_) => "validation_error",
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::InternalServerError(_) => "internal_error",
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::InvalidCredentials => "Incorrect username or password".into(),
            AppError::Unauthenticated(_) => "Not authenticated".into(),
            AppError::InvalidToken(_) => "Invalid token".into(),
            AppError::RateLimited(_) => "Rate limit exceeded. Retry later.".into(),
            AppError::DuplicateUser => "Username already exists.".into(),
            AppError::BadRequest(msg) | AppError::ValidationError(msg) => msg.clone(),
            AppError::ServiceUnavailable(_) => "Service temporarily unavailable".into(),
            AppError::CorruptCredential(_) | AppError::InternalServerError(_) => {
                "Internal server error".into()
            }
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects.
///
/// 401 responses advertise the bearer scheme, 429 responses carry the rate-limit headers,
/// and 5xx details are logged here rather than sent.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::Unauthenticated(_)
            | AppError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::DuplicateUser | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::CorruptCredential(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        }

        let mut builder = HttpResponse::build(status);
        match self {
            AppError::InvalidCredentials
            | AppError::Unauthenticated(_)
            | AppError::InvalidToken(_) => {
                builder.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
            }
            AppError::RateLimited(decision) => {
                for pair in decision.headers() {
                    builder.insert_header(pair);
                }
                return builder.json(json!({
                    "error": self.public_message(),
                    "code": self.code(),
                    "limit": decision.limit,
                    "remaining": decision.remaining,
                    "interval": decision.interval.as_secs(),
                    "retry_after": decision.retry_after_secs(),
                }));
            }
            _ => {}
        }

        builder.json(json!({
            "error": self.public_message(),
            "code": self.code(),
        }))
    }
}

/// Maps persistence failures: collisions become `DuplicateUser`, connection-class failures
/// become `ServiceUnavailable` and anything else is an internal error.
impl From<StoreError> for AppError {
    fn from(error: StoreError) -> AppError {
        match error {
            StoreError::Duplicate(_) => AppError::DuplicateUser,
            StoreError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
            StoreError::Backend(msg) => AppError::InternalServerError(msg),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`.
///
/// The detailed validation messages are preserved.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

/// A stored secret bcrypt refuses to parse is a corrupt credential, not a failed login.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::CorruptCredential(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    async fn body_json(error: AppError) -> serde_json::Value {
        let body = to_bytes(error.error_response().into_body()).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_error_status_codes() {
        let cases = vec![
            (AppError::InvalidCredentials, 401),
            (AppError::Unauthenticated("no such token".into()), 401),
            (AppError::InvalidToken("expired".into()), 401),
            (AppError::CorruptCredential("bad hash".into()), 500),
            (AppError::DuplicateUser, 400),
            (AppError::BadRequest("Invalid input".into()), 400),
            (AppError::ValidationError("too short".into()), 422),
            (AppError::ServiceUnavailable("db down".into()), 503),
            (AppError::InternalServerError("Server error".into()), 500),
        ];

        for (error, expected) in cases {
            let response = error.error_response();
            assert_eq!(response.status().as_u16(), expected, "{:?}", error);
        }
    }

    #[test]
    fn test_unauthorized_responses_advertise_bearer() {
        let response = AppError::InvalidToken("deactivated".into()).error_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[actix_rt::test]
    async fn test_internal_details_are_not_exposed() {
        let json = body_json(AppError::CorruptCredential("$2b$ truncated".into())).await;
        assert_eq!(json["error"], "Internal server error");
        assert_eq!(json["code"], "corrupt_credential");

        let json = body_json(AppError::InvalidToken("expired at 2024-01-01".into())).await;
        assert_eq!(json["error"], "Invalid token");
        assert_eq!(json["code"], "invalid_token");
    }

    #[actix_rt::test]
    async fn test_rate_limited_response_carries_metadata() {
        let decision = RateDecision {
            allowed: false,
            limit: 3,
            remaining: 0,
            interval: Duration::from_secs(60),
            retry_after: Some(Duration::from_millis(41_200)),
        };
        let response = AppError::RateLimited(decision.clone()).error_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("retry-after").unwrap(), "42");
        assert_eq!(response.headers().get("x-ratelimit").unwrap(), "3");

        let json = body_json(AppError::RateLimited(decision)).await;
        assert_eq!(json["retry_after"], 42);
        assert_eq!(json["remaining"], 0);
        assert_eq!(json["interval"], 60);
    }

    #[test]
    fn test_store_errors_map_to_distinct_kinds() {
        assert!(matches!(
            AppError::from(StoreError::Duplicate("username".into())),
            AppError::DuplicateUser
        ));
        assert!(matches!(
            AppError::from(StoreError::Unavailable("pool timed out".into())),
            AppError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            AppError::from(StoreError::Backend("syntax error".into())),
            AppError::InternalServerError(_)
        ));
    }
}
