//! Fixed-window rate limiting keyed by caller identity.
//!
//! A window is replaced outright once it has elapsed; there is no sliding
//! decay. Elapsed entries are swept opportunistically to bound memory, but
//! an unswept entry still compares as elapsed, so sweeping never affects
//! correctness.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::constants::{DEFAULT_RATE_MAX_REQUESTS, DEFAULT_RATE_WINDOW_SECS};

/// How often (in checks) elapsed windows are swept.
const SWEEP_EVERY: u64 = 256;

/// A request budget: at most `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuota {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateQuota {
    fn default() -> Self {
        Self {
            window: Duration::seconds(DEFAULT_RATE_WINDOW_SECS),
            max_requests: DEFAULT_RATE_MAX_REQUESTS,
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub is_limited: bool,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    /// When the current window ends and the counter resets.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, suitable for `Retry-After`.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.reset_at - now).num_seconds().max(0)
    }
}

struct WindowCounter {
    window_start: DateTime<Utc>,
    window: Duration,
    count: u32,
}

/// Shared fixed-window counter store.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    windows: RwLock<HashMap<String, WindowCounter>>,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            windows: RwLock::new(HashMap::new()),
            checks: AtomicU64::new(0),
        }
    }

    /// Count a request from `identifier` against `quota`.
    ///
    /// The increment-and-compare happens under one lock acquisition, so
    /// concurrent requests from the same identifier cannot both slip under
    /// the limit.
    pub fn check(&self, identifier: &str, quota: RateQuota) -> RateLimitDecision {
        let now = self.clock.now();
        let sweep_due =
            self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1;

        let mut windows = self.windows.write().unwrap_or_else(|e| e.into_inner());

        if sweep_due {
            windows.retain(|_, counter| now < counter.window_start + counter.window);
        }

        let counter = windows
            .entry(identifier.to_owned())
            .and_modify(|counter| {
                if now >= counter.window_start + counter.window {
                    // Previous window elapsed: replace, don't decay.
                    counter.window_start = now;
                    counter.window = quota.window;
                    counter.count = 1;
                } else {
                    counter.count = counter.count.saturating_add(1);
                }
            })
            .or_insert(WindowCounter {
                window_start: now,
                window: quota.window,
                count: 1,
            });

        let reset_at = counter.window_start + counter.window;
        if counter.count > quota.max_requests {
            RateLimitDecision {
                is_limited: true,
                remaining: 0,
                reset_at,
            }
        } else {
            RateLimitDecision {
                is_limited: false,
                remaining: quota.max_requests - counter.count,
                reset_at,
            }
        }
    }

    #[cfg(test)]
    fn tracked_identifiers(&self) -> usize {
        self.windows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
