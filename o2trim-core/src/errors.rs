//! Error Types for the Control Core
//!
//! ## Design Philosophy
//!
//! The controller runs on the same small device as its bus drivers, so the
//! error system follows the same rules as the rest of the core:
//!
//! 1. **Small Size**: Every variant is a handful of bytes, errors are `Copy`.
//!
//! 2. **No Heap Allocation**: Reasons are `&'static str`, never `String`.
//!
//! 3. **Cycle Scoped**: No error is fatal to the process. An error ends the
//!    current control cycle without touching regulator state and without
//!    partial actuation; the scheduler logs it and tries again next cadence.
//!
//! ## Error Categories
//!
//! ### Transport
//! - `SensorTransport`: a register access on the ADC bus failed
//! - `ActuatorTransport`: the relay telegram could not be written
//! - `Timeout`: a bus operation took longer than the configured limit
//! - `NonFiniteReading`: the sweep calibrated to NaN or infinity
//!
//! ### Configuration
//! - `InvalidConfig`: the PID section cannot drive a cycle (e.g. zero interval)
//! - `UnsortedTable` / `TableFull`: feed-forward table rejected at construction
//! - `InvalidChannel`: relay outside `1..=4`
//!
//! The safety interlock is not an error. Pressure outside the safe window is a
//! normal, recoverable outcome reported as
//! [`CycleResult::Warning`](crate::control::CycleResult::Warning).
//!
//! ```rust
//! use o2trim_core::{ControlError, BusFault};
//!
//! fn should_retry(err: &ControlError) -> bool {
//!     err.is_transient()
//! }
//!
//! assert!(should_retry(&ControlError::SensorTransport { fault: BusFault::Nack }));
//! assert!(!should_retry(&ControlError::InvalidChannel { channel: 9 }));
//! ```

use thiserror_no_std::Error;

/// Result type for control operations
pub type ControlResult<T> = Result<T, ControlError>;

/// Bus-level failure classification shared by the I2C and UART sides
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusFault {
    /// Device did not acknowledge its address or data
    #[error("no acknowledge")]
    Nack,

    /// Lost arbitration on a multi-master bus
    #[error("arbitration lost")]
    ArbitrationLoss,

    /// Bus-level signalling error
    #[error("bus error")]
    Bus,

    /// Data arrived faster than it could be consumed
    #[error("overrun")]
    Overrun,

    /// Writer accepted zero bytes of the telegram
    #[error("write returned zero")]
    WriteZero,

    /// Driver gave up waiting for the line
    #[error("timed out")]
    Timeout,

    /// Anything the HAL could not classify
    #[error("unclassified bus failure")]
    Other,
}

impl BusFault {
    /// Classify an I2C error reported by an `embedded-hal` implementation
    pub fn from_i2c(kind: embedded_hal::i2c::ErrorKind) -> Self {
        use embedded_hal::i2c::ErrorKind;

        match kind {
            ErrorKind::NoAcknowledge(_) => Self::Nack,
            ErrorKind::ArbitrationLoss => Self::ArbitrationLoss,
            ErrorKind::Bus => Self::Bus,
            ErrorKind::Overrun => Self::Overrun,
            _ => Self::Other,
        }
    }

    /// Classify a serial error reported by an `embedded-io` implementation
    pub fn from_io(kind: embedded_io::ErrorKind) -> Self {
        use embedded_io::ErrorKind;

        match kind {
            ErrorKind::TimedOut => Self::Timeout,
            ErrorKind::Interrupted => Self::Bus,
            _ => Self::Other,
        }
    }
}

/// Errors that end a control cycle
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ControlError {
    /// Register access on the analog front end failed
    #[error("Sensor bus transport failure: {fault}")]
    SensorTransport {
        /// What went wrong on the bus
        fault: BusFault,
    },

    /// Relay telegram could not be delivered
    #[error("Actuator bus transport failure: {fault}")]
    ActuatorTransport {
        /// What went wrong on the bus
        fault: BusFault,
    },

    /// Bus operation exceeded its time budget
    #[error("Bus operation took {elapsed_ms} ms, limit is {limit_ms} ms")]
    Timeout {
        /// Measured duration of the operation
        elapsed_ms: u64,
        /// Configured limit
        limit_ms: u64,
    },

    /// Relay number outside the four addressable coils
    #[error("Relay channel {channel} outside 1..=4")]
    InvalidChannel {
        /// Rejected channel number
        channel: u8,
    },

    /// Calibrated sweep produced NaN or infinity
    #[error("Non-finite {quantity} reading")]
    NonFiniteReading {
        /// Which process value was unusable
        quantity: &'static str,
    },

    /// Configuration cannot drive a control cycle
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: &'static str,
    },

    /// Feed-forward points are not strictly ascending by gas flow
    #[error("Feed-forward table not ascending at point {index}")]
    UnsortedTable {
        /// Index of the first point that breaks the ordering
        index: usize,
    },

    /// More feed-forward points than the table can hold
    #[error("Feed-forward table holds at most {capacity} points")]
    TableFull {
        /// Table capacity
        capacity: usize,
    },
}

impl ControlError {
    /// Whether the next cycle may succeed without operator intervention
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SensorTransport { .. }
                | Self::ActuatorTransport { .. }
                | Self::Timeout { .. }
                | Self::NonFiniteReading { .. }
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BusFault {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Nack => defmt::write!(fmt, "no acknowledge"),
            Self::ArbitrationLoss => defmt::write!(fmt, "arbitration lost"),
            Self::Bus => defmt::write!(fmt, "bus error"),
            Self::Overrun => defmt::write!(fmt, "overrun"),
            Self::WriteZero => defmt::write!(fmt, "write returned zero"),
            Self::Timeout => defmt::write!(fmt, "timed out"),
            Self::Other => defmt::write!(fmt, "unclassified"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ControlError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::SensorTransport { fault } =>
                defmt::write!(fmt, "Sensor bus: {}", fault),
            Self::ActuatorTransport { fault } =>
                defmt::write!(fmt, "Actuator bus: {}", fault),
            Self::Timeout { elapsed_ms, limit_ms } =>
                defmt::write!(fmt, "Bus took {} ms, limit {} ms", elapsed_ms, limit_ms),
            Self::NonFiniteReading { quantity } =>
                defmt::write!(fmt, "Non-finite {} reading", quantity),
            Self::InvalidChannel { channel } =>
                defmt::write!(fmt, "Relay {} outside 1..=4", channel),
            Self::InvalidConfig { reason } =>
                defmt::write!(fmt, "Invalid config: {}", reason),
            Self::UnsortedTable { index } =>
                defmt::write!(fmt, "Table unsorted at {}", index),
            Self::TableFull { capacity } =>
                defmt::write!(fmt, "Table full ({})", capacity),
        }
    }
}
