//! Rate limiter implementation
//!
//! Fixed-window request counters keyed by (identity, operation). A burst that
//! straddles a window boundary can admit up to twice the limit across the two
//! adjacent windows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::RateLimitConfig;

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Total limit for the window
    pub limit: u32,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
}

const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Counting window for one (identity, operation) pair
#[derive(Debug, Clone)]
struct RateWindow {
    count: u32,
    reset_at: Instant,
    reset_at_wall: DateTime<Utc>,
}

impl RateWindow {
    fn open(window: Duration, now: Instant) -> Self {
        let reset_at_wall = TimeDelta::from_std(window)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            count: 0,
            reset_at: now.checked_add(window).unwrap_or(now + FAR_FUTURE),
            reset_at_wall,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.reset_at
    }
}

/// Snapshot of limiter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterStats {
    pub active_windows: usize,
    pub configured_limits: usize,
}

/// Fixed-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    /// Live windows keyed by `identity:operation`
    windows: RwLock<HashMap<String, RateWindow>>,
    /// Per-operation limits
    limits: RwLock<HashMap<String, RateLimitConfig>>,
    default_limit: RateLimitConfig,
}

fn window_key(identity: &str, operation: &str) -> String {
    format!("{}:{}", identity, operation)
}

impl RateLimiter {
    /// Create a rate limiter that applies `default_limit` to every operation
    pub fn new(default_limit: RateLimitConfig) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            limits: RwLock::new(HashMap::new()),
            default_limit,
        }
    }

    /// Add per-operation limits
    pub fn with_limits(mut self, limits: HashMap<String, RateLimitConfig>) -> Self {
        self.limits = RwLock::new(limits);
        self
    }

    /// Limit applied to an operation
    pub async fn limit_for(&self, operation: &str) -> RateLimitConfig {
        self.limits
            .read()
            .await
            .get(operation)
            .copied()
            .unwrap_or(self.default_limit)
    }

    /// Count a request against the caller's window for `operation`
    ///
    /// Increment-and-compare happens under one write lock, so concurrent
    /// callers on the same key can never be admitted past the limit.
    pub async fn check(&self, identity: &str, operation: &str) -> RateLimitResult {
        let config = self.limit_for(operation).await;
        let key = window_key(identity, operation);
        let now = Instant::now();

        let mut windows = self.windows.write().await;
        let window = windows
            .entry(key)
            .or_insert_with(|| RateWindow::open(config.window(), now));

        // Replace rather than mutate an elapsed window
        if window.is_expired(now) {
            *window = RateWindow::open(config.window(), now);
        }

        if window.count >= config.max_requests {
            warn!(
                identity,
                operation,
                count = window.count,
                limit = config.max_requests,
                "Rate limit exceeded"
            );

            return RateLimitResult {
                allowed: false,
                remaining: 0,
                limit: config.max_requests,
                reset_at: window.reset_at_wall,
            };
        }

        window.count += 1;

        RateLimitResult {
            allowed: true,
            remaining: config.max_requests - window.count,
            limit: config.max_requests,
            reset_at: window.reset_at_wall,
        }
    }

    /// Set a custom limit for an operation
    pub async fn set_limit(&self, operation: impl Into<String>, limit: RateLimitConfig) {
        let operation = operation.into();
        info!(
            operation = %operation,
            window_ms = limit.window_ms,
            max_requests = limit.max_requests,
            "Rate limit configured"
        );
        self.limits.write().await.insert(operation, limit);
    }

    /// Drop the caller's window for an operation
    pub async fn reset(&self, identity: &str, operation: &str) {
        self.windows
            .write()
            .await
            .remove(&window_key(identity, operation));
        debug!(identity, operation, "Rate limit reset");
    }

    /// Discard elapsed windows; returns how many were removed
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        let before = windows.len();

        windows.retain(|_, window| !window.is_expired(now));

        let removed = before - windows.len();
        if removed > 0 {
            debug!(entries_removed = removed, "Cleaned rate limit entries");
        }
        removed
    }

    /// Spawn a task that runs [`RateLimiter::cleanup`] every `every`
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                limiter.cleanup().await;
            }
        })
    }

    pub async fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            active_windows: self.windows.read().await.len(),
            configured_limits: self.limits.read().await.len(),
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::per_minute(max_requests))
    }

    #[tokio::test]
    async fn test_rate_limiter_allows_first_request() {
        let limiter = limiter(10);

        let result = limiter.check("key1", "deploy_decoy").await;

        assert!(result.allowed);
        assert_eq!(result.remaining, 9);
        assert_eq!(result.limit, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_blocks_over_limit_with_first_reset() {
        let limiter = limiter(2);

        let first = limiter.check("key1", "deploy_decoy").await;
        let second = limiter.check("key1", "deploy_decoy").await;
        let third = limiter.check("key1", "deploy_decoy").await;

        assert!(first.allowed);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);
        assert!(!third.allowed);
        assert_eq!(third.reset_at, first.reset_at);

        let reset_in = third.reset_at - Utc::now();
        assert!(reset_in <= TimeDelta::seconds(60));
        assert!(reset_in > TimeDelta::seconds(58));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_new_window_after_reset() {
        let limiter = limiter(1);

        let first = limiter.check("key1", "op").await;
        assert!(!limiter.check("key1", "op").await.allowed);

        tokio::time::advance(Duration::from_secs(61)).await;

        let fresh = limiter.check("key1", "op").await;
        assert!(fresh.allowed);
        assert!(fresh.reset_at >= first.reset_at);
    }

    #[tokio::test]
    async fn test_rate_limiter_different_keys() {
        let limiter = limiter(1);

        limiter.check("key1", "op").await;

        assert!(limiter.check("key2", "op").await.allowed);
        assert!(limiter.check("key1", "other_op").await.allowed);
        assert!(!limiter.check("key1", "op").await.allowed);
    }

    #[tokio::test]
    async fn test_rate_limiter_reset() {
        let limiter = limiter(1);

        limiter.check("key1", "op").await;
        assert!(!limiter.check("key1", "op").await.allowed);

        limiter.reset("key1", "op").await;

        assert!(limiter.check("key1", "op").await.allowed);
    }

    #[tokio::test]
    async fn test_per_operation_limit_and_set_limit() {
        let limiter = limiter(100).with_limits(HashMap::from([(
            "deploy_decoy".to_string(),
            RateLimitConfig::per_minute(1),
        )]));

        assert_eq!(limiter.check("k", "deploy_decoy").await.limit, 1);
        assert_eq!(limiter.check("k", "unknown").await.limit, 100);

        limiter.set_limit("unknown", RateLimitConfig::per_minute(5)).await;
        assert_eq!(limiter.limit_for("unknown").await.max_requests, 5);
        assert_eq!(limiter.stats().await.configured_limits, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_burst_never_exceeds_limit() {
        let limiter = Arc::new(limiter(5));

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.check("key1", "op").await.allowed })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        let allowed = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();

        assert_eq!(allowed, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_discards_expired_windows() {
        let limiter = limiter(10);

        limiter.check("key1", "op").await;
        limiter.check("key2", "op").await;
        assert_eq!(limiter.cleanup().await, 0);

        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(limiter.cleanup().await, 2);
        assert_eq!(limiter.stats().await.active_windows, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_window_still_enforces_limit() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_ms: 0,
            max_requests: 1,
        });

        assert!(limiter.check("key1", "op").await.allowed);
        assert!(!limiter.check("key1", "op").await.allowed);

        tokio::time::advance(Duration::from_millis(2)).await;

        assert!(limiter.check("key1", "op").await.allowed);
    }

    #[tokio::test]
    async fn test_zero_limit_denies_everything() {
        let limiter = limiter(0);

        assert!(!limiter.check("key1", "op").await.allowed);
    }
}
