use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use log::{debug, warn};
use std::net::{IpAddr, SocketAddr};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::AppError;
use crate::ratelimit::RateGate;

/// Applies a `RateGate` to every request before it reaches a handler.
///
/// Admitted responses carry the budget headers; rejected requests are answered with 429 and never
/// reach the wrapped service. If the counter store fails the request is let through unmetered.
#[derive(Clone)]
pub struct RateLimiter {
    gate: Arc<RateGate>,
    trust_forwarded_for: bool,
}

impl RateLimiter {
    pub fn new(gate: Arc<RateGate>, trust_forwarded_for: bool) -> Self {
        Self {
            gate,
            trust_forwarded_for,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimiterService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterService {
            service: Rc::new(service),
            gate: self.gate.clone(),
            trust_forwarded_for: self.trust_forwarded_for,
        }))
    }
}

pub struct RateLimiterService<S> {
    service: Rc<S>,
    gate: Arc<RateGate>,
    trust_forwarded_for: bool,
}

impl<S, B> Service<ServiceRequest> for RateLimiterService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let gate = self.gate.clone();
        let client = client_identity(&req, self.trust_forwarded_for);

        Box::pin(async move {
            let client = match client {
                Some(client) => client,
                None => {
                    let err = AppError::InternalServerError(
                        "could not determine client address for rate limiting".into(),
                    );
                    return Ok(req.error_response(err).map_into_right_body());
                }
            };

            let decision = match gate.admit(&client).await {
                Ok(decision) => decision,
                Err(err) => {
                    warn!("Rate limiting skipped for {}: {}", client, err);
                    let res = service.call(req).await?;
                    return Ok(res.map_into_left_body());
                }
            };

            if !decision.allowed {
                debug!("Rejected request from {}: budget of {} spent", client, decision.limit);
                return Ok(req
                    .error_response(AppError::RateLimited(decision))
                    .map_into_right_body());
            }

            let mut res = service.call(req).await?;
            let headers = res.headers_mut();
            for (name, value) in decision.headers() {
                headers.insert(name, value);
            }
            Ok(res.map_into_left_body())
        })
    }
}

/// The key a request is budgeted under: the socket peer's IP, or the forwarded client address
/// when the deployment sits behind a trusted proxy. Ports are dropped so every connection from
/// one host shares a budget.
fn client_identity(req: &ServiceRequest, trust_forwarded_for: bool) -> Option<String> {
    if trust_forwarded_for {
        let info = req.connection_info();
        if let Some(addr) = info.realip_remote_addr() {
            return Some(strip_port(addr));
        }
    }
    req.peer_addr().map(|addr| addr.ip().to_string())
}

fn strip_port(addr: &str) -> String {
    if let Ok(socket) = addr.parse::<SocketAddr>() {
        return socket.ip().to_string();
    }
    let trimmed = addr.trim_start_matches('[').trim_end_matches(']');
    match trimmed.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => addr.to_string(),
    }
}
