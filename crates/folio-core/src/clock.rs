//! Wall-clock sources for session expiration timestamps.
//!
//! Expirations are persisted as epoch milliseconds, while the watchdog
//! itself runs on Tokio timers. `RuntimeClock` keeps the two in step by
//! deriving the wall clock from `tokio::time::Instant`, which also makes
//! paused-time tests see consistent timestamps.

use chrono::Utc;
use tokio::time::Instant;

pub trait Clock: Send + Sync {
    /// Current time as milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Plain wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Wall clock anchored once, then advanced by the Tokio runtime clock.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeClock {
    anchor_ms: i64,
    anchor: Instant,
}

impl RuntimeClock {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now().timestamp_millis())
    }

    /// Anchor the clock at a fixed epoch-ms value.
    pub fn anchored_at(anchor_ms: i64) -> Self {
        Self {
            anchor_ms,
            anchor: Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RuntimeClock {
    fn now_ms(&self) -> i64 {
        let elapsed = Instant::now().saturating_duration_since(self.anchor);
        self.anchor_ms + elapsed.as_millis() as i64
    }
}
