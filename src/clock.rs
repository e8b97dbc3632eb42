//! Deterministic clock abstraction for testable time-dependent logic.
//!
//! Expiry, grace-period, and token-lifetime math all flow through this
//! trait so tests can pin or advance time without sleeping.

use chrono::{DateTime, Utc};

/// Clock trait for deterministic time in tests.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock using actual wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for deterministic testing.
///
/// Clones share the same underlying instant, so a test can hold one handle,
/// hand a clone to the engine, and advance time mid-scenario.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Clone)]
pub struct MockClock {
    now: std::sync::Arc<std::sync::Mutex<DateTime<Utc>>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Create a mock clock frozen at the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Arc::new(std::sync::Mutex::new(now)),
        }
    }

    /// Create a mock clock from an RFC 3339 string.
    pub fn from_rfc3339(s: &str) -> Self {
        Self::new(
            DateTime::parse_from_rfc3339(s)
                .expect("valid RFC 3339")
                .with_timezone(&Utc),
        )
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now = *now + duration;
    }

    /// Jump the clock to an absolute time.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().expect("clock lock") = instant;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}
