//! Time source used by token expiry and rate-limit windows.
//!
//! Every expiry comparison in the crate goes through one injected clock so
//! that a token can never be judged against two different notions of "now"
//! within a single operation, and so tests can move time deterministically
//! instead of sleeping.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Intended for tests and local demos that need to simulate token expiry
/// or rate-limit window rollover without waiting in real time.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Moves the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += step;
    }

    /// Sets the clock to an absolute instant. Moving backwards is allowed
    /// here; callers that care about monotonicity should not.
    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}
