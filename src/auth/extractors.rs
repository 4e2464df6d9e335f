use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, Error as ActixError, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;

use crate::auth::{Session, SessionAuthenticator};
use crate::error::AppError;

/// Extracts the authenticated session for the request's bearer token.
///
/// Adding this extractor to a handler makes it a protected operation: the request is answered
/// with 401 unless `Authorization: Bearer <token>` resolves to an active, unexpired token of an
/// existing user. Requires `web::Data<SessionAuthenticator>` in app data.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

impl FromRequest for CurrentSession {
    type Error = ActixError; // AppError will be converted into ActixError via ResponseError
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let authenticator = req.app_data::<web::Data<SessionAuthenticator>>().cloned();
        let token = bearer_token(req).map(str::to_owned);

        Box::pin(async move { resolve(authenticator, token).await.map_err(Into::into) })
    }
}

async fn resolve(
    authenticator: Option<web::Data<SessionAuthenticator>>,
    token: Option<String>,
) -> Result<CurrentSession, AppError> {
    let authenticator = authenticator.ok_or_else(|| {
        AppError::InternalServerError("SessionAuthenticator missing from app data".into())
    })?;
    let token = token.ok_or_else(|| {
        AppError::Unauthenticated("missing or malformed Authorization header".into())
    })?;

    Ok(CurrentSession(authenticator.authenticate(&token).await?))
}

/// Returns the credentials of an `Authorization: Bearer <token>` header.
/// The scheme is matched case-insensitively; anything else yields `None`.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credentials) = value.split_once(' ')?;
    let credentials = credentials.trim();

    if !scheme.eq_ignore_ascii_case("bearer")
        || credentials.is_empty()
        || credentials.contains(char::is_whitespace)
    {
        return None;
    }
    Some(credentials)
}
