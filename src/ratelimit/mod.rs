//! Per-client request budgeting.
//!
//! Each client identity gets `limit` requests per fixed window of `interval`. Window state lives
//! in a `CounterStore` under `ratelimit:{client}:time` (window start, epoch milliseconds) and
//! `ratelimit:{client}:count` (requests admitted in the window). A window is reset lazily by the
//! first request that arrives after it has run out.
//!
//! The read-then-increment sequence is not one atomic operation, so concurrent requests at a
//! window boundary may briefly exceed the limit. A client can also land up to twice the limit
//! across two adjacent windows.

pub mod middleware;
pub mod redis;
pub mod store;

use actix_web::http::header::{HeaderName, HeaderValue, RETRY_AFTER};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RateLimitConfig;

pub use self::middleware::RateLimiter;
pub use self::redis::RedisCounterStore;
pub use self::store::{CounterError, CounterStore, MemoryCounterStore};

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u64,
    /// Requests left in the current window after this one.
    pub remaining: u64,
    pub interval: Duration,
    /// Time until the current window ends. Only set on rejection.
    pub retry_after: Option<Duration>,
}

impl RateDecision {
    /// Whole seconds until a retry can succeed, rounded up.
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after.map(|wait| {
            let secs = wait.as_secs();
            if wait.subsec_nanos() > 0 {
                secs + 1
            } else {
                secs
            }
        })
    }

    /// Response headers describing the client's budget.
    pub fn headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        let mut headers = vec![
            (
                HeaderName::from_static("x-ratelimit"),
                HeaderValue::from(self.limit),
            ),
            (
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(self.remaining),
            ),
            (
                HeaderName::from_static("x-ratelimit-interval"),
                HeaderValue::from(self.interval.as_secs()),
            ),
        ];
        if let Some(secs) = self.retry_after_secs() {
            headers.push((RETRY_AFTER, HeaderValue::from(secs)));
            headers.push((
                HeaderName::from_static("x-retry-after"),
                HeaderValue::from(secs),
            ));
        }
        headers
    }
}

/// Decides whether a client may make another request.
pub struct RateGate {
    store: Arc<dyn CounterStore>,
    limit: u64,
    interval: Duration,
}

impl RateGate {
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            limit: config.limit,
            interval: config.interval,
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Checks and, when admitted, consumes one unit of `client`'s budget.
    pub async fn admit(&self, client: &str) -> Result<RateDecision, CounterError> {
        self.admit_at(client, Utc::now()).await
    }

    /// `admit` against an explicit clock reading.
    pub async fn admit_at(
        &self,
        client: &str,
        now: DateTime<Utc>,
    ) -> Result<RateDecision, CounterError> {
        let time_key = format!("ratelimit:{}:time", client);
        let count_key = format!("ratelimit:{}:count", client);
        let now_ms = now.timestamp_millis();
        let interval_ms = i64::try_from(self.interval.as_millis()).unwrap_or(i64::MAX);

        // An absent record reads as the epoch, so a first request always opens a window
        let mut window_start = self.store.get(&time_key).await?.unwrap_or(0);
        if now_ms.saturating_sub(window_start) > interval_ms {
            self.store.set(&time_key, now_ms, self.interval).await?;
            self.store.set(&count_key, 0, self.interval).await?;
            window_start = now_ms;
        }

        let count = self.store.get(&count_key).await?.unwrap_or(0).max(0) as u64;
        if count >= self.limit {
            let elapsed = now_ms.saturating_sub(window_start).max(0);
            let wait_ms = interval_ms.saturating_sub(elapsed).max(0) as u64;
            return Ok(RateDecision {
                allowed: false,
                limit: self.limit,
                remaining: self.limit.saturating_sub(count),
                interval: self.interval,
                retry_after: Some(Duration::from_millis(wait_ms)),
            });
        }

        self.store.incr(&count_key, self.interval).await?;
        Ok(RateDecision {
            allowed: true,
            limit: self.limit,
            remaining: self.limit - (count + 1),
            interval: self.interval,
            retry_after: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn gate(limit: u64, interval_secs: u64) -> RateGate {
        RateGate::new(
            Arc::new(MemoryCounterStore::new()),
            &RateLimitConfig {
                limit,
                interval: Duration::from_secs(interval_secs),
                trust_forwarded_for: false,
            },
        )
    }

    #[actix_rt::test]
    async fn test_budget_counts_down_then_rejects() {
        let gate = gate(3, 60);
        let now = Utc::now();

        for expected in [2, 1, 0] {
            let decision = gate.admit_at("10.0.0.1", now).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected);
            assert_eq!(decision.retry_after, None);
        }

        let later = now + chrono::Duration::seconds(20);
        let rejected = gate.admit_at("10.0.0.1", later).await.unwrap();
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.retry_after, Some(Duration::from_secs(40)));
    }

    #[actix_rt::test]
    async fn test_budget_resets_after_interval() {
        let gate = gate(2, 60);
        let now = Utc::now();

        gate.admit_at("c", now).await.unwrap();
        gate.admit_at("c", now).await.unwrap();
        assert!(!gate.admit_at("c", now).await.unwrap().allowed);

        // Exactly one interval later the window is still the same one
        let boundary = now + chrono::Duration::seconds(60);
        assert!(!gate.admit_at("c", boundary).await.unwrap().allowed);

        let next = now + chrono::Duration::milliseconds(60_001);
        let decision = gate.admit_at("c", next).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }

    #[actix_rt::test]
    async fn test_clients_have_independent_budgets() {
        let gate = gate(1, 60);
        let now = Utc::now();

        assert!(gate.admit_at("a", now).await.unwrap().allowed);
        assert!(!gate.admit_at("a", now).await.unwrap().allowed);
        assert!(gate.admit_at("b", now).await.unwrap().allowed);
    }

    #[actix_rt::test]
    async fn test_rejection_never_waits_longer_than_interval() {
        let gate = gate(1, 30);
        let now = Utc::now();
        gate.admit_at("c", now).await.unwrap();

        // A clock reading behind the recorded window start
        let skewed = now - chrono::Duration::seconds(5);
        let decision = gate.admit_at("c", skewed).await.unwrap();
        assert!(!decision.allowed);
        assert!(decision.retry_after.unwrap() <= Duration::from_secs(30));
    }

    #[test]
    fn test_headers_and_rounding() {
        let allowed = RateDecision {
            allowed: true,
            limit: 100,
            remaining: 99,
            interval: Duration::from_secs(60),
            retry_after: None,
        };
        let names: Vec<_> = allowed.headers().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                HeaderName::from_static("x-ratelimit"),
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderName::from_static("x-ratelimit-interval"),
            ]
        );

        let rejected = RateDecision {
            allowed: false,
            remaining: 0,
            retry_after: Some(Duration::from_millis(1)),
            ..allowed
        };
        assert_eq!(rejected.retry_after_secs(), Some(1));
        assert_eq!(rejected.headers().len(), 5);
    }
}
