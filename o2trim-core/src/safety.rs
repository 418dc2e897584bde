//! Combustion Air Pressure Interlock
//!
//! Pulsing the air damper is only allowed while the measured combustion air
//! pressure sits inside the configured window. The check runs on the same
//! sample set that was calibrated for the cycle, before any correction math,
//! whether or not the regulator would act at all.
//!
//! An out-of-range pressure is not an error. It ends the cycle with a warning,
//! leaves the regulator state untouched and clears once pressure returns.

use core::fmt;

/// Why the interlock blocked a cycle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SafetyWarning {
    /// Measured pressure outside `[min, max]`
    PressureOutOfRange {
        pressure: f32,
        min: f32,
        max: f32,
    },
}

impl fmt::Display for SafetyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PressureOutOfRange { pressure, .. } => {
                write!(f, "Pressure out of safe range: {:.2}", pressure)
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SafetyWarning {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::PressureOutOfRange { pressure, min, max } => defmt::write!(
                fmt,
                "Pressure {} outside [{}, {}]",
                pressure,
                min,
                max
            ),
        }
    }
}

/// Inclusive safe pressure window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyGuard {
    pub min_safe: f32,
    pub max_safe: f32,
}

impl SafetyGuard {
    pub const fn new(min_safe: f32, max_safe: f32) -> Self {
        Self { min_safe, max_safe }
    }

    /// Pass when `min_safe <= pressure <= max_safe`.
    ///
    /// NaN never passes.
    pub fn check(&self, pressure: f32) -> Result<(), SafetyWarning> {
        if pressure >= self.min_safe && pressure <= self.max_safe {
            Ok(())
        } else {
            Err(SafetyWarning::PressureOutOfRange {
                pressure,
                min: self.min_safe,
                max: self.max_safe,
            })
        }
    }
}

/// Free-standing form of [`SafetyGuard::check`]
pub fn check(pressure: f32, min_safe: f32, max_safe: f32) -> Result<(), SafetyWarning> {
    SafetyGuard::new(min_safe, max_safe).check(pressure)
}
