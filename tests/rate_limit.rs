use actix_web::http::StatusCode;
use actix_web::{test, web, App, HttpResponse, HttpServer};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use taskguard::config::RateLimitConfig;
use taskguard::ratelimit::{CounterError, CounterStore, MemoryCounterStore, RateGate, RateLimiter};

fn limiter(store: Arc<dyn CounterStore>, limit: u64) -> RateLimiter {
    let config = RateLimitConfig {
        limit,
        interval: Duration::from_secs(60),
        trust_forwarded_for: false,
    };
    RateLimiter::new(Arc::new(RateGate::new(store, &config)), false)
}

async fn ping() -> HttpResponse {
    HttpResponse::Ok().body("pong")
}

fn peer(addr: &str) -> SocketAddr {
    addr.parse().unwrap()
}

struct BrokenCounters;

#[async_trait]
impl CounterStore for BrokenCounters {
    async fn get(&self, _key: &str) -> Result<Option<i64>, CounterError> {
        Err(CounterError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: i64, _ttl: Duration) -> Result<(), CounterError> {
        Err(CounterError::Unavailable("connection refused".into()))
    }

    async fn incr(&self, _key: &str, _ttl: Duration) -> Result<i64, CounterError> {
        Err(CounterError::Unavailable("connection refused".into()))
    }
}

#[test_log::test(actix_rt::test)]
async fn test_budget_is_advertised_then_enforced() {
    let app = test::init_service(
        App::new()
            .wrap(limiter(Arc::new(MemoryCounterStore::new()), 3))
            .route("/ping", web::get().to(ping)),
    )
    .await;

    for expected in ["2", "1", "0"] {
        let req = test::TestRequest::get()
            .uri("/ping")
            .peer_addr(peer("192.0.2.10:50000"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("x-ratelimit").unwrap(), "3");
        assert_eq!(resp.headers().get("x-ratelimit-remaining").unwrap(), expected);
        assert_eq!(resp.headers().get("x-ratelimit-interval").unwrap(), "60");
        assert!(resp.headers().get("retry-after").is_none());
    }

    // A new connection from the same host shares the budget
    let req = test::TestRequest::get()
        .uri("/ping")
        .peer_addr(peer("192.0.2.10:50001"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

    let retry_after: u64 = resp
        .headers()
        .get("retry-after")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after <= 60);
    assert_eq!(
        resp.headers().get("x-retry-after").unwrap(),
        resp.headers().get("retry-after").unwrap()
    );

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "rate_limited");
    assert_eq!(body["limit"], 3);
    assert_eq!(body["remaining"], 0);
    assert_eq!(body["retry_after"], retry_after);
}

#[test_log::test(actix_rt::test)]
async fn test_clients_are_limited_independently() {
    let app = test::init_service(
        App::new()
            .wrap(limiter(Arc::new(MemoryCounterStore::new()), 1))
            .route("/ping", web::get().to(ping)),
    )
    .await;

    let first = test::TestRequest::get()
        .uri("/ping")
        .peer_addr(peer("192.0.2.1:1000"))
        .to_request();
    assert_eq!(test::call_service(&app, first).await.status(), StatusCode::OK);

    let again = test::TestRequest::get()
        .uri("/ping")
        .peer_addr(peer("192.0.2.1:1000"))
        .to_request();
    assert_eq!(
        test::call_service(&app, again).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let other = test::TestRequest::get()
        .uri("/ping")
        .peer_addr(peer("192.0.2.2:1000"))
        .to_request();
    assert_eq!(test::call_service(&app, other).await.status(), StatusCode::OK);
}

#[test_log::test(actix_rt::test)]
async fn test_counter_outage_fails_open() {
    let app = test::init_service(
        App::new()
            .wrap(limiter(Arc::new(BrokenCounters), 1))
            .route("/ping", web::get().to(ping)),
    )
    .await;

    for _ in 0..3 {
        let req = test::TestRequest::get()
            .uri("/ping")
            .peer_addr(peer("192.0.2.3:1000"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("x-ratelimit").is_none());
    }
}

#[test_log::test(actix_rt::test)]
async fn test_request_without_client_address_is_rejected() {
    let app = test::init_service(
        App::new()
            .wrap(limiter(Arc::new(MemoryCounterStore::new()), 5))
            .route("/ping", web::get().to(ping)),
    )
    .await;

    let req = test::TestRequest::get().uri("/ping").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test_log::test(actix_rt::test)]
async fn test_limits_over_real_http() {
    let gate = Arc::new(RateGate::new(
        Arc::new(MemoryCounterStore::new()),
        &RateLimitConfig {
            limit: 2,
            interval: Duration::from_secs(60),
            trust_forwarded_for: false,
        },
    ));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RateLimiter::new(gate.clone(), false))
            .route("/ping", web::get().to(ping))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_rt::spawn(server);

    let client = reqwest::Client::new();
    let url = format!("http://{}/ping", addr);

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let resp = client.get(&url).send().await.unwrap();
        statuses.push(resp.status().as_u16());
    }
    assert_eq!(statuses, vec![200, 200, 429]);

    handle.stop(true).await;
}
