use actix_web::{get, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;

/// Liveness check for load balancers.
///
/// Sits outside `/{API_PREFIX}/v1` and needs no bearer token. It checks neither Postgres nor
/// the counter store, so a 200 only means the worker is serving. Requests still pass through
/// `RateLimiter` and count against the caller's budget.
#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": Utc::now()
    }))
}
