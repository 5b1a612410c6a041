//! Sliding-window rate limiter keyed by principal (C4).
//!
//! Each key tracks two independent windows (60s and 3600s) as a pruned list
//! of call timestamps, mirroring a true sliding window rather than a fixed
//! bucket that resets on a clock boundary. Both windows must allow a call;
//! the limiter is in-process only (cross-instance sharing is a non-goal).

use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub per_minute: u32,
    pub per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { per_minute: 60, per_hour: 1000 }
    }
}

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

struct SlidingWindowCounter {
    timestamps: Vec<Instant>,
}

impl SlidingWindowCounter {
    fn new() -> Self {
        Self { timestamps: Vec::new() }
    }

    /// Drop timestamps outside `window`, return the remaining count.
    fn prune_and_count(&mut self, now: Instant, window: Duration) -> usize {
        self.timestamps.retain(|t| now.duration_since(*t) < window);
        self.timestamps.len()
    }

    fn earliest_in_window(&self, window: Duration, now: Instant) -> Option<Instant> {
        self.timestamps.iter().filter(|t| now.duration_since(**t) < window).min().copied()
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Reject { retry_after_seconds: u64 },
}

struct KeyState {
    minute: SlidingWindowCounter,
    hour: SlidingWindowCounter,
}

/// Two-window sliding counter per key (principal id, forwarded IP, or peer IP).
pub struct RateLimiter {
    config: RateLimitConfig,
    keys: DashMap<String, KeyState>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, keys: DashMap::new() }
    }

    /// Check and, if allowed, record a call under `key` at `now`. Both
    /// windows must have capacity; if either is exhausted the call is
    /// rejected and no timestamp is recorded.
    pub fn check(&self, key: &str, now: Instant) -> Decision {
        let mut entry = self.keys.entry(key.to_string()).or_insert_with(|| KeyState {
            minute: SlidingWindowCounter::new(),
            hour: SlidingWindowCounter::new(),
        });

        let minute_count = entry.minute.prune_and_count(now, MINUTE);
        let hour_count = entry.hour.prune_and_count(now, HOUR);

        if minute_count >= self.config.per_minute as usize {
            let retry_after = entry
                .minute
                .earliest_in_window(MINUTE, now)
                .map(|earliest| MINUTE.saturating_sub(now.duration_since(earliest)).as_secs().max(1))
                .unwrap_or(1);
            return Decision::Reject { retry_after_seconds: retry_after };
        }
        if hour_count >= self.config.per_hour as usize {
            let retry_after = entry
                .hour
                .earliest_in_window(HOUR, now)
                .map(|earliest| HOUR.saturating_sub(now.duration_since(earliest)).as_secs().max(1))
                .unwrap_or(1);
            return Decision::Reject { retry_after_seconds: retry_after };
        }

        entry.minute.timestamps.push(now);
        entry.hour.timestamps.push(now);
        Decision::Allow
    }

    /// Remaining calls in the current minute window for `key`, for
    /// `X-RateLimit-Remaining-Minute`-style response headers.
    #[must_use]
    pub fn remaining_minute(&self, key: &str, now: Instant) -> u32 {
        self.keys
            .get_mut(key)
            .map(|mut e| {
                let used = e.minute.prune_and_count(now, MINUTE);
                self.config.per_minute.saturating_sub(used as u32)
            })
            .unwrap_or(self.config.per_minute)
    }

    /// The configured per-minute budget, for `X-RateLimit-Limit-Minute`-style
    /// response headers.
    #[must_use]
    pub fn limit_per_minute(&self) -> u32 {
        self.config.per_minute
    }
}

/// Derive the rate-limit key for a request: authenticated principal id,
/// else a trusted forwarded-for IP, else the direct peer IP.
#[must_use]
pub fn resolve_key(principal_id: Option<&str>, forwarded_for: Option<&str>, peer_ip: &str) -> String {
    if let Some(p) = principal_id {
        return format!("principal:{p}");
    }
    if let Some(fwd) = forwarded_for {
        if let Some(first) = fwd.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
            return format!("ip:{first}");
        }
    }
    format!("ip:{peer_ip}")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_calls_under_both_windows() {
        let limiter = RateLimiter::new(RateLimitConfig { per_minute: 5, per_hour: 100 });
        let now = Instant::now();
        for _ in 0..5 {
            assert_eq!(limiter.check("u1", now), Decision::Allow);
        }
    }

    #[test]
    fn rejects_once_minute_budget_exhausted() {
        let limiter = RateLimiter::new(RateLimitConfig { per_minute: 2, per_hour: 100 });
        let now = Instant::now();
        assert_eq!(limiter.check("u1", now), Decision::Allow);
        assert_eq!(limiter.check("u1", now), Decision::Allow);
        match limiter.check("u1", now) {
            Decision::Reject { retry_after_seconds } => assert!(retry_after_seconds >= 1),
            Decision::Allow => panic!("expected rejection after minute budget exhausted"),
        }
    }

    #[test]
    fn hour_window_independent_of_minute_window() {
        let limiter = RateLimiter::new(RateLimitConfig { per_minute: 1000, per_hour: 1 });
        let now = Instant::now();
        assert_eq!(limiter.check("u1", now), Decision::Allow);
        assert!(matches!(limiter.check("u1", now), Decision::Reject { .. }));
    }

    #[test]
    fn distinct_keys_do_not_share_budget() {
        let limiter = RateLimiter::new(RateLimitConfig { per_minute: 1, per_hour: 100 });
        let now = Instant::now();
        assert_eq!(limiter.check("u1", now), Decision::Allow);
        assert_eq!(limiter.check("u2", now), Decision::Allow);
    }

    #[test]
    fn resolve_key_prefers_principal_then_forwarded_ip_then_peer() {
        assert_eq!(resolve_key(Some("alice"), Some("1.2.3.4"), "9.9.9.9"), "principal:alice");
        assert_eq!(resolve_key(None, Some("1.2.3.4, 5.6.7.8"), "9.9.9.9"), "ip:1.2.3.4");
        assert_eq!(resolve_key(None, None, "9.9.9.9"), "ip:9.9.9.9");
    }

    #[test]
    fn window_entries_older_than_window_are_pruned() {
        let mut counter = SlidingWindowCounter::new();
        let start = Instant::now();
        counter.timestamps.push(start);
        let later = start + Duration::from_secs(61);
        assert_eq!(counter.prune_and_count(later, MINUTE), 0);
    }
}
