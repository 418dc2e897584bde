//! Time management for the control loop
//!
//! The controller only ever needs two things from a clock:
//! - intervals for rate limiting the regulator
//! - deadlines for releasing a relay pulse
//!
//! Both are measured in milliseconds from whatever epoch the source uses.

use core::cell::Cell;

/// Timestamp in milliseconds since the source's epoch (device boot for monotonic)
pub type Timestamp = u64;

/// Milliseconds per second, for converting configured seconds to ticks
pub const MS_PER_SECOND: f32 = 1000.0;

/// Source of time for the system
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Convert a configured duration in seconds to milliseconds
///
/// Negative and non-finite inputs collapse to zero.
pub fn seconds_to_ms(seconds: f32) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    libm::roundf(seconds * MS_PER_SECOND) as u64
}

/// Monotonic time source backed by `std::time::Instant`
///
/// Starts at 0 when created, always increases
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicTime {
    start: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicTime {
    pub fn new() -> Self {
        Self { start: std::time::Instant::now() }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicTime {
    fn now(&self) -> Timestamp {
        self.start.elapsed().as_millis() as Timestamp
    }
}

/// Manually driven time source for tests and simulations
///
/// Uses interior mutability so one clock can be shared by reference with
/// the control loop while the test advances it.
#[derive(Debug, Clone, Default)]
pub struct FixedTime {
    timestamp: Cell<Timestamp>,
}

impl FixedTime {
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp: Cell::new(timestamp) }
    }

    pub fn set(&self, timestamp: Timestamp) {
        self.timestamp.set(timestamp);
    }

    pub fn advance(&self, ms: u64) {
        self.timestamp.set(self.timestamp.get().saturating_add(ms));
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp.get()
    }
}
