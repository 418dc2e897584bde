//! Voltage to Physical Unit Calibration
//!
//! Every analog channel carries a two-point linear calibration taken from the
//! transmitter's output range:
//!
//! ```text
//!         y_max - y_min
//! y  =  ---------------- * (v - v_min) + y_min
//!         v_max - v_min
//! ```
//!
//! The mapping is not clamped to `[y_min, y_max]`. A transmitter that drifts
//! outside its calibrated span produces values outside the span too, so the
//! drift stays visible in the readout instead of being silently clipped.
//!
//! ## Degenerate Ranges
//!
//! `v_min == v_max` would divide by zero. Writes through
//! [`ChannelCalibration::new`] and [`ChannelCalibration::set_voltage_range`]
//! nudge `v_max` to `v_min + CALIBRATION_EPSILON`; the mapping applies the same
//! nudge to values that reached it some other way (e.g. deserialized).

use crate::constants::{CALIBRATION_EPSILON, CHANNEL_COUNT};

/// Short text label for a channel name or unit
pub type Label = heapless::String<24>;

/// Raw differential voltages in channel order `[ch0, ch1, ch2, ch3]`
pub type RawVoltages = [f32; CHANNEL_COUNT];

/// Channel index of the first oxygen probe
pub const O2_PROBE_1: usize = 0;
/// Channel index of the second oxygen probe
pub const O2_PROBE_2: usize = 1;
/// Channel index of the gas flow transmitter
pub const GAS_FLOW: usize = 2;
/// Channel index of the combustion air pressure transmitter
pub const AIR_PRESSURE: usize = 3;

/// Build a label, truncating at a character boundary when it does not fit
pub fn label(text: &str) -> Label {
    let mut out = Label::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Linear calibration of one analog channel
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelCalibration {
    /// Display name
    pub name: Label,
    v_min: f32,
    v_max: f32,
    /// Physical value at `v_min`
    pub y_min: f32,
    /// Physical value at `v_max`
    pub y_max: f32,
    /// Display unit
    pub unit: Label,
}

impl ChannelCalibration {
    /// Create a calibration, nudging a zero-width voltage range
    pub fn new(name: &str, v_min: f32, v_max: f32, y_min: f32, y_max: f32, unit: &str) -> Self {
        let mut calibration = Self {
            name: label(name),
            v_min,
            v_max,
            y_min,
            y_max,
            unit: label(unit),
        };
        calibration.set_voltage_range(v_min, v_max);
        calibration
    }

    /// Lower calibration voltage
    pub fn v_min(&self) -> f32 {
        self.v_min
    }

    /// Upper calibration voltage
    pub fn v_max(&self) -> f32 {
        self.v_max
    }

    /// Replace the voltage range.
    ///
    /// Returns `true` when `v_max` had to be nudged away from `v_min`.
    pub fn set_voltage_range(&mut self, v_min: f32, v_max: f32) -> bool {
        self.v_min = v_min;
        if v_max == v_min {
            self.v_max = v_min + CALIBRATION_EPSILON;
            log_warn!(
                "Calibration {}: v_min == v_max == {}, nudged v_max",
                self.name.as_str(),
                v_min
            );
            true
        } else {
            self.v_max = v_max;
            false
        }
    }

    /// Whether the stored range would divide by zero without the nudge
    pub fn is_degenerate(&self) -> bool {
        self.v_max == self.v_min
    }

    fn effective_v_max(&self) -> f32 {
        if self.is_degenerate() {
            self.v_min + CALIBRATION_EPSILON
        } else {
            self.v_max
        }
    }

    /// Physical units per volt
    pub fn slope(&self) -> f32 {
        (self.y_max - self.y_min) / (self.effective_v_max() - self.v_min)
    }

    /// Map a voltage to the physical value (unclamped)
    pub fn to_physical(&self, volts: f32) -> f32 {
        self.slope() * (volts - self.v_min) + self.y_min
    }

    /// Map a physical value back to the voltage that produces it.
    ///
    /// `None` when the physical span is zero and the mapping is not invertible.
    pub fn to_voltage(&self, value: f32) -> Option<f32> {
        if self.y_max == self.y_min {
            return None;
        }
        let span_v = self.effective_v_max() - self.v_min;
        Some((value - self.y_min) * span_v / (self.y_max - self.y_min) + self.v_min)
    }

    /// Factory calibration for all four channels
    pub fn defaults() -> [ChannelCalibration; CHANNEL_COUNT] {
        [
            Self::new("O2_1", 0.0, 1.0, 0.0, 25.0, "%"),
            Self::new("O2_2", 0.0, 1.0, 0.0, 25.0, "%"),
            Self::new("Gas_Flow", 0.0, 1.0, 0.0, 100.0, "m3/h"),
            Self::new("Air_Pressure", 0.0, 1.0, 0.0, 10.0, "kPa"),
        ]
    }
}

/// Calibrated process values for one sample set
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessValues {
    /// Oxygen from probe 1 (%)
    pub o2_1: f32,
    /// Oxygen from probe 2 (%)
    pub o2_2: f32,
    /// Gas flow
    pub gas_flow: f32,
    /// Combustion air pressure
    pub air_pressure: f32,
    /// Mean of the two oxygen probes
    pub o2_avg: f32,
}

/// Apply per-channel calibration to one sweep of raw voltages
pub fn apply_calibration(
    raw: &RawVoltages,
    calibration: &[ChannelCalibration; CHANNEL_COUNT],
) -> ProcessValues {
    let o2_1 = calibration[O2_PROBE_1].to_physical(raw[O2_PROBE_1]);
    let o2_2 = calibration[O2_PROBE_2].to_physical(raw[O2_PROBE_2]);

    ProcessValues {
        o2_1,
        o2_2,
        gas_flow: calibration[GAS_FLOW].to_physical(raw[GAS_FLOW]),
        air_pressure: calibration[AIR_PRESSURE].to_physical(raw[AIR_PRESSURE]),
        o2_avg: (o2_1 + o2_2) / 2.0,
    }
}
