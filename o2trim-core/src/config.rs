//! Typed controller configuration and the store it is fetched from
//!
//! The control loop never caches configuration. Every cycle asks its
//! [`ConfigStore`] for the PID section, the calibration and the feed-forward
//! table, so an operator edit takes effect on the next cycle.

use crate::calibration::ChannelCalibration;
use crate::constants::{control::*, CHANNEL_COUNT};
use crate::errors::{ControlError, ControlResult};
use crate::lookup::FeedForwardTable;
use crate::safety::SafetyGuard;
use crate::time::{seconds_to_ms, Timestamp};

/// Regulator and interlock settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PidConfig {
    /// Master switch for automatic control
    pub enabled: bool,
    /// Target oxygen (%)
    pub o2_setpoint: f32,
    /// Error magnitude held without action
    pub deadband: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Output clamp, symmetric around zero
    pub max_correction: f32,
    /// Nominal cycle period in seconds, also the integration step
    pub control_interval_s: f32,
    /// Relay pulse width in seconds
    pub impulse_duration_s: f32,
    pub pressure_min_safe: f32,
    pub pressure_max_safe: f32,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            o2_setpoint: DEFAULT_O2_SETPOINT,
            deadband: DEFAULT_DEADBAND,
            kp: DEFAULT_KP,
            ki: DEFAULT_KI,
            kd: DEFAULT_KD,
            max_correction: DEFAULT_MAX_CORRECTION,
            control_interval_s: DEFAULT_CONTROL_INTERVAL_S,
            impulse_duration_s: DEFAULT_IMPULSE_DURATION_S,
            pressure_min_safe: DEFAULT_PRESSURE_MIN_SAFE,
            pressure_max_safe: DEFAULT_PRESSURE_MAX_SAFE,
        }
    }
}

impl PidConfig {
    /// Check the section can drive a control cycle
    pub fn validate(&self) -> ControlResult<()> {
        let values = [
            self.o2_setpoint,
            self.deadband,
            self.kp,
            self.ki,
            self.kd,
            self.max_correction,
            self.control_interval_s,
            self.impulse_duration_s,
            self.pressure_min_safe,
            self.pressure_max_safe,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(invalid("PID values must be finite"));
        }
        if self.control_interval_s <= 0.0 {
            return Err(invalid("control interval must be positive"));
        }
        if self.impulse_duration_s < 0.0 {
            return Err(invalid("impulse duration must not be negative"));
        }
        if self.deadband < 0.0 {
            return Err(invalid("deadband must not be negative"));
        }
        if self.max_correction < 0.0 {
            return Err(invalid("max correction must not be negative"));
        }
        if self.pressure_min_safe > self.pressure_max_safe {
            return Err(invalid("safe pressure window is inverted"));
        }
        Ok(())
    }

    pub fn control_interval_ms(&self) -> Timestamp {
        seconds_to_ms(self.control_interval_s)
    }

    pub fn impulse_duration_ms(&self) -> Timestamp {
        seconds_to_ms(self.impulse_duration_s)
    }

    pub fn safety_guard(&self) -> SafetyGuard {
        SafetyGuard::new(self.pressure_min_safe, self.pressure_max_safe)
    }
}

fn invalid(reason: &'static str) -> ControlError {
    ControlError::InvalidConfig { reason }
}

/// Source of configuration, re-read every cycle
pub trait ConfigStore {
    fn get_calibration(&self) -> [ChannelCalibration; CHANNEL_COUNT];

    fn get_feed_forward_table(&self) -> FeedForwardTable;

    fn get_pid_config(&self) -> PidConfig;
}

impl<T: ConfigStore + ?Sized> ConfigStore for &T {
    fn get_calibration(&self) -> [ChannelCalibration; CHANNEL_COUNT] {
        (**self).get_calibration()
    }

    fn get_feed_forward_table(&self) -> FeedForwardTable {
        (**self).get_feed_forward_table()
    }

    fn get_pid_config(&self) -> PidConfig {
        (**self).get_pid_config()
    }
}

/// Complete controller configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerConfig {
    pub channels: [ChannelCalibration; CHANNEL_COUNT],
    pub feed_forward: FeedForwardTable,
    pub pid: PidConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            channels: ChannelCalibration::defaults(),
            feed_forward: FeedForwardTable::defaults(),
            pid: PidConfig::default(),
        }
    }
}

impl ConfigStore for ControllerConfig {
    fn get_calibration(&self) -> [ChannelCalibration; CHANNEL_COUNT] {
        self.channels.clone()
    }

    fn get_feed_forward_table(&self) -> FeedForwardTable {
        self.feed_forward.clone()
    }

    fn get_pid_config(&self) -> PidConfig {
        self.pid
    }
}
