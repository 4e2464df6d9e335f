//! Redis-backed counter store
//!
//! Shares rate-limit windows between every instance pointed at the same Redis database.
//! Expiry uses `SET .. PX` and a PEXPIRE on fresh counters, so window records vanish on their
//! own once the interval passes.

use async_trait::async_trait;
use lazy_static::lazy_static;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use std::time::Duration;

use super::store::{CounterError, CounterStore};

lazy_static! {
    // INCR and a conditional PEXPIRE in one server-side step, so a counter recreated by INCR
    // after its key expired never outlives the window.
    static ref INCR_WITH_TTL: Script = Script::new(
        r"
        local value = redis.call('INCR', KEYS[1])
        if redis.call('PTTL', KEYS[1]) < 0 then
            redis.call('PEXPIRE', KEYS[1], ARGV[1])
        end
        return value
        ",
    );
}

pub struct RedisCounterStore {
    /// Multiplexed connection for async operations
    connection: MultiplexedConnection,
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore").finish_non_exhaustive()
    }
}

impl RedisCounterStore {
    /// Connects to `redis_url` (e.g. "redis://localhost:6379").
    pub async fn connect(redis_url: &str) -> Result<Self, CounterError> {
        let client = Client::open(redis_url).map_err(unavailable)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;
        Ok(Self { connection })
    }
}

fn unavailable(error: redis::RedisError) -> CounterError {
    CounterError::Unavailable(error.to_string())
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, CounterError> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(unavailable)
    }

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CounterError> {
        let mut conn = self.connection.clone();
        let ttl_ms = ttl_millis(ttl);

        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, CounterError> {
        let mut conn = self.connection.clone();
        let value: i64 = INCR_WITH_TTL
            .key(key)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(value)
    }
}

/// PX and PEXPIRE take milliseconds and reject zero.
fn ttl_millis(ttl: Duration) -> u64 {
    ttl.as_millis().clamp(1, u64::MAX as u128) as u64
}
