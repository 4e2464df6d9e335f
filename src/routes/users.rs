use crate::{
    auth::{AccountService, CurrentSession, RegisterRequest, SessionIssuer, TokenRequest},
    error::AppError,
    models::{TokenResponse, UserRead},
};
use actix_web::{delete, get, post, web, HttpResponse, Responder};
use validator::Validate;

/// Register a new user
///
/// Creates an account and returns its public view. No token is issued; call `/users/token`.
///
/// ## Responses:
/// - `201 Created`: `{id, username, disabled}`.
/// - `400 Bad Request`: Username taken or longer than the configured maximum.
/// - `422 Unprocessable Entity`: Username pattern or password length rejected.
#[post("")]
pub async fn register(
    accounts: web::Data<AccountService>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;

    let user = accounts
        .register(&register_data.username, &register_data.password)
        .await?;

    Ok(HttpResponse::Created().json(UserRead::from(&user)))
}

/// Current user
///
/// Returns the owner of the presented bearer token.
#[get("")]
pub async fn current_user(session: CurrentSession) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(UserRead::from(&session.0.user)))
}

/// Delete the current user
///
/// Deactivates every token of the user and removes the account.
#[delete("")]
pub async fn delete_user(
    accounts: web::Data<AccountService>,
    session: CurrentSession,
) -> Result<impl Responder, AppError> {
    accounts.delete(session.0.user.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Issue a token
///
/// Exchanges a username and password for a bearer token.
///
/// ## Responses:
/// - `200 OK`: `{token, token_type, active, expires_at}`.
/// - `401 Unauthorized`: Generic "incorrect username or password" for any mismatch.
#[post("/token")]
pub async fn token(
    issuer: web::Data<SessionIssuer>,
    credentials: web::Json<TokenRequest>,
) -> Result<impl Responder, AppError> {
    let token = issuer
        .issue(&credentials.username, &credentials.password)
        .await?;

    Ok(HttpResponse::Ok().json(TokenResponse::from(token)))
}

/// Log out
///
/// Deactivates the presented token only.
#[post("/logout")]
pub async fn logout(
    issuer: web::Data<SessionIssuer>,
    session: CurrentSession,
) -> Result<impl Responder, AppError> {
    issuer.logout(&session.0.token.token).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Log out everywhere
///
/// Deactivates every token of the current user, including the presented one.
#[post("/logout/all")]
pub async fn logout_all(
    issuer: web::Data<SessionIssuer>,
    session: CurrentSession,
) -> Result<impl Responder, AppError> {
    issuer.logout_all(session.0.user.id).await?;
    Ok(HttpResponse::NoContent().finish())
}
