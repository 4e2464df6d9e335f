pub mod health;
pub mod users;

use actix_web::web;

/// Mounts the versioned API. Expects `AuthServices` to have been registered as app data.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .service(users::register)
            .service(users::current_user)
            .service(users::delete_user)
            .service(users::token)
            .service(users::logout)
            .service(users::logout_all),
    );
}
