//! Rate limiter registry shared by every request.
//!
//! Each scope keeps its buckets behind its own lock. The eviction task
//! clears every map on a fixed period under the same locks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use keygate_core::config::RateLimitConfig;

use super::bucket::TokenBucket;

/// Which limiter a request is counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Api,
    Web,
    Critical,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Web => "web",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct ScopeLimiter {
    enabled: bool,
    capacity: u32,
    refill_per_second: f64,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl ScopeLimiter {
    fn new(enabled: bool, count: u32, duration_seconds: u64) -> Self {
        let duration = duration_seconds.max(1) as f64;
        Self {
            enabled,
            capacity: count,
            refill_per_second: f64::from(count) / duration,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    async fn allow(&self, key: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_per_second, now))
            .try_take(now)
    }

    async fn clear(&self) -> usize {
        let mut buckets = self.buckets.lock().await;
        let evicted = buckets.len();
        buckets.clear();
        evicted
    }

    async fn len(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

/// Token-bucket limiters for the API, web and critical scopes.
#[derive(Debug)]
pub struct RateLimiterRegistry {
    api: ScopeLimiter,
    web: ScopeLimiter,
    critical: ScopeLimiter,
    eviction_interval: Duration,
}

impl RateLimiterRegistry {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            api: ScopeLimiter::new(
                config.api.enabled,
                config.api.count,
                config.api.duration_seconds,
            ),
            web: ScopeLimiter::new(
                config.web.enabled,
                config.web.count,
                config.web.duration_seconds,
            ),
            critical: ScopeLimiter::new(
                true,
                config.critical.count,
                config.critical.duration_seconds,
            ),
            eviction_interval: Duration::from_secs(config.eviction_interval_seconds.max(1)),
        }
    }

    fn limiter(&self, scope: Scope) -> &ScopeLimiter {
        match scope {
            Scope::Api => &self.api,
            Scope::Web => &self.web,
            Scope::Critical => &self.critical,
        }
    }

    /// Count one request from `key`. Returns `false` when it must be refused.
    pub async fn allow(&self, scope: Scope, key: &str) -> bool {
        let allowed = self.limiter(scope).allow(key).await;
        if !allowed {
            debug!(scope = %scope, key, "Rate limit exceeded");
        }
        allowed
    }

    pub fn is_enabled(&self, scope: Scope) -> bool {
        self.limiter(scope).enabled
    }

    /// Number of client keys currently tracked for `scope`.
    pub async fn tracked_keys(&self, scope: Scope) -> usize {
        self.limiter(scope).len().await
    }

    /// Drop every bucket in every scope.
    pub async fn evict_all(&self) -> usize {
        self.api.clear().await + self.web.clear().await + self.critical.clear().await
    }

    /// Run eviction every configured period until `shutdown` flips to `true`.
    pub fn spawn_eviction(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let period = self.eviction_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_secs = period.as_secs(), "Rate limiter eviction started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = self.evict_all().await;
                        debug!(evicted, "Rate limiter buckets evicted");
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Rate limiter eviction stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use keygate_core::config::{CriticalLimitConfig, ScopeLimitConfig};

    use super::*;

    fn config(api: ScopeLimitConfig) -> RateLimitConfig {
        RateLimitConfig {
            api,
            web: ScopeLimitConfig {
                enabled: false,
                count: 0,
                duration_seconds: 60,
            },
            critical: CriticalLimitConfig {
                count: 2,
                duration_seconds: 1200,
            },
            eviction_interval_seconds: 3600,
            trusted_proxies: None,
        }
    }

    fn enabled(count: u32, duration_seconds: u64) -> ScopeLimitConfig {
        ScopeLimitConfig {
            enabled: true,
            count,
            duration_seconds,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn count_per_duration() {
        let registry = RateLimiterRegistry::new(&config(enabled(3, 60)));
        for _ in 0..3 {
            assert!(registry.allow(Scope::Api, "10.0.0.1").await);
        }
        assert!(!registry.allow(Scope::Api, "10.0.0.1").await);
        assert!(registry.allow(Scope::Api, "10.0.0.2").await);

        tokio::time::advance(Duration::from_secs(60)).await;
        for _ in 0..3 {
            assert!(registry.allow(Scope::Api, "10.0.0.1").await);
        }
        assert!(!registry.allow(Scope::Api, "10.0.0.1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_scope_allows_without_tracking() {
        let registry = RateLimiterRegistry::new(&config(enabled(1, 60)));
        for _ in 0..10 {
            assert!(registry.allow(Scope::Web, "10.0.0.1").await);
        }
        assert_eq!(registry.tracked_keys(Scope::Web).await, 0);
        assert!(!registry.is_enabled(Scope::Web));
    }

    #[tokio::test(start_paused = true)]
    async fn critical_is_always_enforced() {
        let registry = RateLimiterRegistry::new(&config(enabled(1, 60)));
        assert!(registry.is_enabled(Scope::Critical));
        assert!(registry.allow(Scope::Critical, "k").await);
        assert!(registry.allow(Scope::Critical, "k").await);
        assert!(!registry.allow(Scope::Critical, "k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn scopes_are_independent() {
        let registry = RateLimiterRegistry::new(&config(enabled(1, 60)));
        assert!(registry.allow(Scope::Api, "k").await);
        assert!(!registry.allow(Scope::Api, "k").await);
        assert!(registry.allow(Scope::Critical, "k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_restores_capacity() {
        let registry = RateLimiterRegistry::new(&config(enabled(1, 3600)));
        assert!(registry.allow(Scope::Api, "k").await);
        assert!(!registry.allow(Scope::Api, "k").await);

        assert_eq!(registry.evict_all().await, 1);
        assert_eq!(registry.tracked_keys(Scope::Api).await, 0);
        assert!(registry.allow(Scope::Api, "k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_task_runs_on_period_and_stops() {
        let registry = Arc::new(RateLimiterRegistry::new(&config(enabled(1, 7200))));
        let (tx, rx) = watch::channel(false);
        let handle = Arc::clone(&registry).spawn_eviction(rx);

        assert!(registry.allow(Scope::Api, "k").await);
        assert!(!registry.allow(Scope::Api, "k").await);

        tokio::time::sleep(Duration::from_secs(3601)).await;
        assert_eq!(registry.tracked_keys(Scope::Api).await, 0);
        assert!(registry.allow(Scope::Api, "k").await);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
