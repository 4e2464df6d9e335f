pub mod accounts;
pub mod authenticator;
pub mod extractors;
pub mod issuer;
pub mod password;
pub mod token;

use actix_web::{error::JsonPayloadError, web, HttpRequest};
use lazy_static::lazy_static;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::store::{TokenStore, UserStore};

// Re-export necessary items
pub use accounts::AccountService;
pub use authenticator::{Session, SessionAuthenticator};
pub use extractors::CurrentSession;
pub use issuer::SessionIssuer;
pub use password::CredentialHasher;
pub use token::generate_token;

lazy_static! {
    // Regex for username validation: alphanumeric, underscores, hyphens
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Represents the payload for a token request.
///
/// Deliberately unvalidated: any mismatch, including malformed values, is reported as the same
/// generic credentials failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

/// Represents the payload for a new user registration request.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Desired username for the new account.
    /// Alphanumeric, underscores or hyphens. The upper length bound is configurable and enforced
    /// by `AccountService`.
    #[validate(
        length(min = 1),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: String,
    /// Password for the new account.
    /// Must be at least 6 characters long.
    #[validate(length(min = 6))]
    pub password: String,
}

/// The session-related services shared by every worker.
#[derive(Clone)]
pub struct AuthServices {
    pub accounts: web::Data<AccountService>,
    pub issuer: web::Data<SessionIssuer>,
    pub authenticator: web::Data<SessionAuthenticator>,
}

impl AuthServices {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<dyn TokenStore>, config: &AuthConfig) -> Self {
        Self {
            accounts: web::Data::new(AccountService::new(users.clone(), config)),
            issuer: web::Data::new(SessionIssuer::new(users.clone(), tokens.clone(), config)),
            authenticator: web::Data::new(SessionAuthenticator::new(users, tokens)),
        }
    }

    /// Registers the services as app data so handlers and `CurrentSession` can reach them.
    /// Also installs the JSON body error handler, so malformed payloads get the usual error body.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.accounts.clone())
            .app_data(self.issuer.clone())
            .app_data(self.authenticator.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error));
    }
}

fn json_error(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    debug!("Rejected JSON body on {}: {}", req.path(), err);
    let message = match err {
        JsonPayloadError::ContentType => "Expected a JSON body.",
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            "Request body is too large."
        }
        _ => "Malformed JSON body.",
    };
    AppError::BadRequest(message.into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_register_request_validation() {
        let valid_register = RegisterRequest {
            username: "test_user-123".to_string(),
            password: "password123".to_string(),
        };
        assert!(valid_register.validate().is_ok());

        let invalid_username_register = RegisterRequest {
            username: "test user!".to_string(), // Contains space and exclamation
            password: "password123".to_string(),
        };
        assert!(invalid_username_register.validate().is_err());

        let empty_username_register = RegisterRequest {
            username: "".to_string(),
            password: "password123".to_string(),
        };
        assert!(empty_username_register.validate().is_err());

        let short_password_register = RegisterRequest {
            username: "alice".to_string(),
            password: "123".to_string(),
        };
        assert!(short_password_register.validate().is_err());
    }
}
