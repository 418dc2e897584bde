//! The settings document as stored on flash
//!
//! ```json
//! {
//!   "ch0": { "name": "O2_1", "v_min": 0.0, "v_max": 1.0, "y_min": 0.0, "y_max": 25.0, "unit": "%" },
//!   "ch1": { ... }, "ch2": { ... }, "ch3": { ... },
//!   "air_fuel_table": [ { "gas": 0.0, "air_target": 1.0 }, ... five entries ... ],
//!   "pid_control": {
//!     "enabled": true, "o2_setpoint": 3.5, "deadband": 0.1,
//!     "Kp": 0.8, "Ki": 0.02, "Kd": 0.1, "max_correction": 0.8,
//!     "control_interval": 10.0, "impulse_duration": 1.5,
//!     "pressure_min_safe": 0.5, "pressure_max_safe": 9.0
//!   }
//! }
//! ```
//!
//! Every field is required and unknown fields are rejected. A document is
//! either complete or it does not load.

use serde::{Deserialize, Serialize};

use o2trim_core::constants::CALIBRATION_EPSILON;
use o2trim_core::{ChannelCalibration, ControllerConfig, FeedForwardPoint, PidConfig};

/// Unit stored when an edit leaves it blank
pub const BLANK_UNIT: &str = "ед.";

/// One analog channel as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSection {
    pub name: String,
    pub v_min: f32,
    pub v_max: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub unit: String,
}

impl From<&ChannelCalibration> for ChannelSection {
    fn from(cal: &ChannelCalibration) -> Self {
        Self {
            name: cal.name.as_str().to_owned(),
            v_min: cal.v_min(),
            v_max: cal.v_max(),
            y_min: cal.y_min,
            y_max: cal.y_max,
            unit: cal.unit.as_str().to_owned(),
        }
    }
}

impl ChannelSection {
    /// Calibration for the core, nudging a zero-width voltage range
    pub fn to_calibration(&self) -> ChannelCalibration {
        ChannelCalibration::new(&self.name, self.v_min, self.v_max, self.y_min, self.y_max, &self.unit)
    }

    /// Apply the calibration editor's rules to an edit replacing `previous`.
    ///
    /// A blank name keeps the previous name, a blank unit becomes
    /// [`BLANK_UNIT`], and an empty or inverted voltage range is repaired to
    /// `v_max = v_min + 0.001`.
    pub fn edited_over(mut self, previous: &ChannelSection) -> Self {
        let name = self.name.trim();
        self.name = if name.is_empty() { previous.name.clone() } else { name.to_owned() };

        let unit = self.unit.trim();
        self.unit = if unit.is_empty() { BLANK_UNIT.to_owned() } else { unit.to_owned() };

        if self.v_min >= self.v_max {
            self.v_max = self.v_min + CALIBRATION_EPSILON;
        }
        self
    }
}

/// One feed-forward point as stored
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TablePoint {
    pub gas: f32,
    pub air_target: f32,
}

impl From<&FeedForwardPoint> for TablePoint {
    fn from(point: &FeedForwardPoint) -> Self {
        Self { gas: point.gas, air_target: point.air_target }
    }
}

impl From<TablePoint> for FeedForwardPoint {
    fn from(point: TablePoint) -> Self {
        FeedForwardPoint::new(point.gas, point.air_target)
    }
}

/// Regulator section as stored
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PidSection {
    pub enabled: bool,
    pub o2_setpoint: f32,
    pub deadband: f32,
    #[serde(rename = "Kp")]
    pub kp: f32,
    #[serde(rename = "Ki")]
    pub ki: f32,
    #[serde(rename = "Kd")]
    pub kd: f32,
    pub max_correction: f32,
    /// Seconds
    pub control_interval: f32,
    /// Seconds
    pub impulse_duration: f32,
    pub pressure_min_safe: f32,
    pub pressure_max_safe: f32,
}

impl From<&PidConfig> for PidSection {
    fn from(pid: &PidConfig) -> Self {
        Self {
            enabled: pid.enabled,
            o2_setpoint: pid.o2_setpoint,
            deadband: pid.deadband,
            kp: pid.kp,
            ki: pid.ki,
            kd: pid.kd,
            max_correction: pid.max_correction,
            control_interval: pid.control_interval_s,
            impulse_duration: pid.impulse_duration_s,
            pressure_min_safe: pid.pressure_min_safe,
            pressure_max_safe: pid.pressure_max_safe,
        }
    }
}

impl From<&PidSection> for PidConfig {
    fn from(pid: &PidSection) -> Self {
        Self {
            enabled: pid.enabled,
            o2_setpoint: pid.o2_setpoint,
            deadband: pid.deadband,
            kp: pid.kp,
            ki: pid.ki,
            kd: pid.kd,
            max_correction: pid.max_correction,
            control_interval_s: pid.control_interval,
            impulse_duration_s: pid.impulse_duration,
            pressure_min_safe: pid.pressure_min_safe,
            pressure_max_safe: pid.pressure_max_safe,
        }
    }
}

/// Whole settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsDocument {
    pub ch0: ChannelSection,
    pub ch1: ChannelSection,
    pub ch2: ChannelSection,
    pub ch3: ChannelSection,
    pub air_fuel_table: Vec<TablePoint>,
    pub pid_control: PidSection,
}

impl SettingsDocument {
    pub fn from_config(config: &ControllerConfig) -> Self {
        let [ch0, ch1, ch2, ch3] = &config.channels;
        Self {
            ch0: ch0.into(),
            ch1: ch1.into(),
            ch2: ch2.into(),
            ch3: ch3.into(),
            air_fuel_table: config.feed_forward.points().iter().map(TablePoint::from).collect(),
            pid_control: (&config.pid).into(),
        }
    }

    pub fn channels(&self) -> [&ChannelSection; 4] {
        [&self.ch0, &self.ch1, &self.ch2, &self.ch3]
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut ChannelSection> {
        match index {
            0 => Some(&mut self.ch0),
            1 => Some(&mut self.ch1),
            2 => Some(&mut self.ch2),
            3 => Some(&mut self.ch3),
            _ => None,
        }
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for SettingsDocument {
    fn default() -> Self {
        Self::from_config(&ControllerConfig::default())
    }
}
