//! Counter-store collaborator for the rate gate.
//!
//! A shared key/value store of integers with per-key expiry. `RedisCounterStore` shares
//! counters across instances; `MemoryCounterStore` keeps them in process.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Expired entries are swept once the map grows past this many keys.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current value of `key`, or `None` if it is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<i64>, CounterError>;

    /// Sets `key` to `value`, expiring after `ttl`.
    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CounterError>;

    /// Atomically adds one to `key` and returns the new value. An absent key counts from zero.
    /// A key left without an expiry gets `ttl`; an existing expiry is kept.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, CounterError>;
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Process-local counter store. Limits are per instance only.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, CounterError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value)),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CounterError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if entries.len() >= SWEEP_THRESHOLD {
            entries.retain(|_, entry| entry.is_live(now));
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, CounterError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: 0,
            expires_at: None,
        });
        if !entry.is_live(now) {
            entry.value = 0;
            entry.expires_at = None;
        }
        entry.expires_at.get_or_insert(now + ttl);
        entry.value += 1;
        Ok(entry.value)
    }
}
