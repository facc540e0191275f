//! Time sources for circuit breaker bookkeeping
//!
//! This module provides different clock implementations:
//! - `MonotonicClock`: Real time anchored on `Instant`, immune to NTP adjustments
//! - `ManualClock`: Time that only moves when told to, for deterministic tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of monotonic time for a circuit breaker
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Get monotonic time elapsed since an arbitrary fixed origin
    fn monotonic_time(&self) -> Duration;
}

/// Real monotonic clock anchored at creation
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    /// Monotonic time anchor (prevents clock skew issues from NTP)
    start_time: Instant,
}

impl MonotonicClock {
    /// Create a new clock starting at zero
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn monotonic_time(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Manually driven clock
///
/// Time starts at zero and only advances through [`ManualClock::advance`].
/// Share it with a breaker through an `Arc` to step over recovery timeouts
/// without sleeping.
///
/// # Example
///
/// ```rust
/// use lazy_breaker::{CircuitBreaker, ManualClock};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::new());
/// let breaker = CircuitBreaker::builder("test")
///     .clock(clock.clone())
///     .build();
///
/// clock.advance(Duration::from_secs(5));
/// assert!(breaker.is_closed());
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Create a new clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn monotonic_time(&self) -> Duration {
        self.elapsed()
    }
}
