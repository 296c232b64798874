//! Wall-clock source for timestamps and future-timestamp checks
//!
//! All time in the ledger is milliseconds since the Unix epoch. Code that needs the
//! current time takes a `&dyn PhysicalClock` so tests can pin it.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of wall-clock milliseconds
pub trait PhysicalClock: Send + Sync + fmt::Debug {
    /// Current time in milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;
}

/// The operating system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl PhysicalClock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// A clock pinned to one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u64);

impl PhysicalClock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0
    }
}
