use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use log::{info, warn};
use std::io;
use std::sync::Arc;

use taskguard::auth::AuthServices;
use taskguard::config::Config;
use taskguard::ratelimit::{
    CounterStore, MemoryCounterStore, RateGate, RateLimiter, RedisCounterStore,
};
use taskguard::routes::{self, health};
use taskguard::store::PgStore;

fn startup_error(error: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, error.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(startup_error)?;

    let store = PgStore::connect(&config.database_url, config.database_max_connections)
        .await
        .map_err(startup_error)?;
    store.ensure_schema().await.map_err(startup_error)?;
    let store = Arc::new(store);

    let counters: Arc<dyn CounterStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisCounterStore::connect(url).await.map_err(startup_error)?),
        None => {
            warn!("REDIS_URL not set; rate limits are kept in memory and apply per instance");
            Arc::new(MemoryCounterStore::new())
        }
    };

    let auth = AuthServices::new(store.clone(), store, &config.auth);
    let gate = Arc::new(RateGate::new(counters, &config.rate_limit));
    let trust_forwarded_for = config.rate_limit.trust_forwarded_for;
    let api_base = config.api_base_path();

    info!(
        "Starting server at {} (API under {}, {} requests per {}s per client)",
        config.server_url(),
        api_base,
        gate.limit(),
        gate.interval().as_secs()
    );

    HttpServer::new(move || {
        App::new()
            .wrap(RateLimiter::new(gate.clone(), trust_forwarded_for))
            .wrap(Logger::default())
            .configure(|cfg| auth.configure(cfg))
            .service(health::health)
            .service(web::scope(&api_base).configure(routes::config))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
