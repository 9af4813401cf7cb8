//! Public-share password abuse limiter (spec §4.8). Keyed on `(client-ip,
//! share-token)`, shared across requests via a `DashMap`, pruned lazily on
//! access per spec §9's "shared in-memory limiter map → guarded structure
//! with TTL sweep" redesign note.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;

const WINDOW_SECS: i64 = 60;
const WINDOW_MAX_ATTEMPTS: u32 = 10;
const BACKOFF_THRESHOLD: u32 = 3;
const BACKOFF_MAX_SECS: i64 = 300;

#[derive(Clone, Debug)]
struct LimiterEntry {
    window_start: DateTime<Utc>,
    window_count: u32,
    attempts: u32,
    blocked_until: Option<DateTime<Utc>>,
}

impl LimiterEntry {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            window_count: 0,
            attempts: 0,
            blocked_until: None,
        }
    }
}

/// The outcome of a pre-check before a password attempt is evaluated.
pub enum LimiterDecision {
    Allowed,
    Blocked { retry_after_secs: u64 },
}

/// Shared abuse limiter for public-share password attempts.
#[derive(Clone, Default)]
pub struct AbuseLimiter {
    entries: Arc<DashMap<(IpAddr, String), LimiterEntry>>,
}

impl AbuseLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a password attempt for `(ip, token)` is currently
    /// allowed, and record it against the window counter. Call this before
    /// verifying the password; call [`Self::record_failure`] or
    /// [`Self::record_success`] afterward.
    pub fn check(&self, ip: IpAddr, token: &str) -> LimiterDecision {
        let now = Utc::now();
        let key = (ip, token.to_string());
        let mut entry = self.entries.entry(key).or_insert_with(|| LimiterEntry::fresh(now));

        if let Some(blocked_until) = entry.blocked_until {
            if blocked_until > now {
                let retry_after = (blocked_until - now).num_seconds().max(1) as u64;
                return LimiterDecision::Blocked { retry_after_secs: retry_after };
            }
            entry.blocked_until = None;
        }

        if now - entry.window_start >= chrono::Duration::seconds(WINDOW_SECS) {
            entry.window_start = now;
            entry.window_count = 0;
        }

        if entry.window_count >= WINDOW_MAX_ATTEMPTS {
            let retry_after = (WINDOW_SECS - (now - entry.window_start).num_seconds()).max(1) as u64;
            return LimiterDecision::Blocked { retry_after_secs: retry_after };
        }

        entry.window_count += 1;
        LimiterDecision::Allowed
    }

    /// Record a failed password verification: bump the failure counter and
    /// set the exponential backoff deadline once `attempts >= 3`.
    pub fn record_failure(&self, ip: IpAddr, token: &str) -> u64 {
        let now = Utc::now();
        let key = (ip, token.to_string());
        let mut entry = self.entries.entry(key).or_insert_with(|| LimiterEntry::fresh(now));
        entry.attempts += 1;
        if entry.attempts >= BACKOFF_THRESHOLD {
            let exponent = (entry.attempts - BACKOFF_THRESHOLD + 1) as u32;
            let backoff_secs = 2i64.saturating_pow(exponent).min(BACKOFF_MAX_SECS);
            entry.blocked_until = Some(now + chrono::Duration::seconds(backoff_secs));
            backoff_secs as u64
        } else {
            0
        }
    }

    /// Clear both counters for `(ip, token)` on successful verification.
    pub fn record_success(&self, ip: IpAddr, token: &str) {
        self.entries.remove(&(ip, token.to_string()));
    }

    /// Drop entries that are no longer blocked and whose window has
    /// elapsed; called opportunistically from an optional periodic sweep
    /// task, never required for correctness.
    pub fn sweep(&self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| {
            let window_alive = now - entry.window_start < chrono::Duration::seconds(WINDOW_SECS);
            let blocked = entry.blocked_until.map(|b| b > now).unwrap_or(false);
            window_alive || blocked
        });
    }

    /// Number of tracked keys, for tests and diagnostics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
    }

    #[test]
    fn allows_first_attempt() {
        let limiter = AbuseLimiter::new();
        assert!(matches!(limiter.check(ip(), "tok"), LimiterDecision::Allowed));
    }

    #[test]
    fn window_cap_blocks_after_ten() {
        let limiter = AbuseLimiter::new();
        for _ in 0..WINDOW_MAX_ATTEMPTS {
            assert!(matches!(limiter.check(ip(), "tok"), LimiterDecision::Allowed));
        }
        assert!(matches!(limiter.check(ip(), "tok"), LimiterDecision::Blocked { .. }));
    }

    #[test]
    fn backoff_sequence_grows_exponentially() {
        let limiter = AbuseLimiter::new();
        assert_eq!(limiter.record_failure(ip(), "tok"), 0);
        assert_eq!(limiter.record_failure(ip(), "tok"), 0);
        assert_eq!(limiter.record_failure(ip(), "tok"), 2);
        assert_eq!(limiter.record_failure(ip(), "tok"), 4);
        assert_eq!(limiter.record_failure(ip(), "tok"), 8);
    }

    #[test]
    fn backoff_caps_at_300() {
        let limiter = AbuseLimiter::new();
        for _ in 0..20 {
            limiter.record_failure(ip(), "tok");
        }
        assert_eq!(limiter.record_failure(ip(), "tok"), 300);
    }

    #[test]
    fn success_clears_state() {
        let limiter = AbuseLimiter::new();
        limiter.record_failure(ip(), "tok");
        limiter.record_failure(ip(), "tok");
        limiter.record_failure(ip(), "tok");
        limiter.record_success(ip(), "tok");
        assert!(limiter.is_empty());
    }

    #[test]
    fn distinct_keys_are_independent() {
        let limiter = AbuseLimiter::new();
        for _ in 0..WINDOW_MAX_ATTEMPTS {
            limiter.check(ip(), "tok-a");
        }
        assert!(matches!(limiter.check(ip(), "tok-b"), LimiterDecision::Allowed));
    }
}
