//! Fixed-window rate limiting for conversions.
//!
//! Each client key owns a counter and the time its window resets. Expired
//! entries are swept on every check, so the store never grows beyond the
//! set of clients active within one window.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;

/// Counter state for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    pub count: u32,
    /// Unix milliseconds at which the window resets.
    pub reset_at_ms: u64,
}

/// Where rate-limit counters live.
pub trait RateLimitStore {
    fn get(&self, key: &str) -> Option<RateLimitEntry>;
    fn set(&mut self, key: &str, entry: RateLimitEntry);
    /// Drop every entry whose window has ended at `now_ms`.
    fn sweep(&mut self, now_ms: u64);
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRateLimitStore {
    entries: HashMap<String, RateLimitEntry>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).copied()
    }

    fn set(&mut self, key: &str, entry: RateLimitEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    fn sweep(&mut self, now_ms: u64) {
        self.entries.retain(|_, entry| entry.reset_at_ms > now_ms);
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32, reset_at_ms: u64 },
    Exceeded { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Per-client fixed-window limiter over an injected store.
#[derive(Debug, Clone)]
pub struct RateLimiter<S> {
    store: S,
    max_requests: u32,
    window_ms: u64,
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(store: S, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window_ms: window.as_millis() as u64,
        }
    }

    pub fn from_config(store: S, config: &PipelineConfig) -> Self {
        Self {
            store,
            max_requests: config.rate_limit_max_requests,
            window_ms: config.rate_limit_window_ms(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Count one request from `key` at `now_ms` (Unix milliseconds).
    pub fn check(&mut self, key: &str, now_ms: u64) -> RateDecision {
        self.store.sweep(now_ms);

        let entry = match self.store.get(key) {
            Some(entry) if entry.reset_at_ms > now_ms => entry,
            _ => RateLimitEntry {
                count: 0,
                reset_at_ms: now_ms.saturating_add(self.window_ms),
            },
        };

        if entry.count >= self.max_requests {
            let retry_after = Duration::from_millis(entry.reset_at_ms - now_ms);
            log::warn!(
                "rate limit exceeded for {} ({} requests), retry in {}",
                key,
                entry.count,
                format_retry_after(retry_after)
            );
            return RateDecision::Exceeded { retry_after };
        }

        let updated = RateLimitEntry {
            count: entry.count + 1,
            ..entry
        };
        self.store.set(key, updated);
        RateDecision::Allowed {
            remaining: self.max_requests - updated.count,
            reset_at_ms: updated.reset_at_ms,
        }
    }
}

/// Human-readable retry delay, rounded up: "45 seconds", "1 minute",
/// "2 hours".
pub fn format_retry_after(duration: Duration) -> String {
    fn plural(n: u64, unit: &str) -> String {
        if n == 1 {
            format!("1 {}", unit)
        } else {
            format!("{} {}s", n, unit)
        }
    }

    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    if secs < 60 {
        plural(secs.max(1), "second")
    } else if secs < 3600 {
        plural(secs.div_ceil(60), "minute")
    } else {
        plural(secs.div_ceil(3600), "hour")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: u64 = 3_600_000;

    fn limiter(max: u32) -> RateLimiter<InMemoryRateLimitStore> {
        RateLimiter::new(InMemoryRateLimitStore::new(), max, Duration::from_millis(HOUR_MS))
    }

    #[test]
    fn test_allows_up_to_max() {
        let mut limiter = limiter(3);
        for expected_remaining in [2, 1, 0] {
            match limiter.check("client", 1_000) {
                RateDecision::Allowed { remaining, reset_at_ms } => {
                    assert_eq!(remaining, expected_remaining);
                    assert_eq!(reset_at_ms, 1_000 + HOUR_MS);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(
            limiter.check("client", 61_000),
            RateDecision::Exceeded {
                retry_after: Duration::from_millis(HOUR_MS - 60_000)
            }
        );
    }

    #[test]
    fn test_clients_are_independent() {
        let mut limiter = limiter(1);
        assert!(limiter.check("a", 0).is_allowed());
        assert!(!limiter.check("a", 1).is_allowed());
        assert!(limiter.check("b", 1).is_allowed());
    }

    #[test]
    fn test_window_resets() {
        let mut limiter = limiter(1);
        assert!(limiter.check("a", 0).is_allowed());
        assert!(!limiter.check("a", HOUR_MS - 1).is_allowed());
        assert!(limiter.check("a", HOUR_MS).is_allowed());
    }

    #[test]
    fn test_expired_entries_are_swept() {
        let mut limiter = limiter(5);
        limiter.check("a", 0);
        limiter.check("b", 10);
        assert_eq!(limiter.store().len(), 2);

        limiter.check("c", HOUR_MS + 20);
        assert_eq!(limiter.store().len(), 1);
    }

    #[test]
    fn test_from_config() {
        let mut limiter = RateLimiter::from_config(InMemoryRateLimitStore::new(), &PipelineConfig::default());
        for _ in 0..10 {
            assert!(limiter.check("ip", 0).is_allowed());
        }
        assert!(!limiter.check("ip", 0).is_allowed());
    }

    #[test]
    fn test_format_retry_after() {
        assert_eq!(format_retry_after(Duration::from_millis(300)), "1 second");
        assert_eq!(format_retry_after(Duration::from_secs(45)), "45 seconds");
        assert_eq!(format_retry_after(Duration::from_secs(60)), "1 minute");
        assert_eq!(format_retry_after(Duration::from_secs(61)), "2 minutes");
        assert_eq!(format_retry_after(Duration::from_secs(3599)), "60 minutes");
        assert_eq!(format_retry_after(Duration::from_secs(7200)), "2 hours");
    }
}
