//! Regulator Thresholds and Factory Defaults
//!
//! Defaults match the settings document a fresh controller writes on first
//! boot.

// ===== REGULATOR =====

/// Minimum |correction| that produces a relay pulse.
///
/// Independent of the deadband. Corrections between the deadband and this
/// threshold are computed and reported but do not move the valve.
pub const ACTION_THRESHOLD: f32 = 0.1;

/// Offset applied to `v_max` when a calibration has `v_min == v_max`
pub const CALIBRATION_EPSILON: f32 = 0.001;

/// Capacity of the feed-forward table
pub const FEED_FORWARD_POINTS: usize = 5;

/// Relay that opens the air valve ("more air")
pub const DEFAULT_UP_RELAY: u8 = 4;

/// Relay that closes the air valve ("less air")
pub const DEFAULT_DOWN_RELAY: u8 = 3;

/// Time budget for one sensor sweep or one relay telegram (ms)
pub const DEFAULT_BUS_TIMEOUT_MS: u64 = 250;

// ===== FACTORY PID SETTINGS =====

/// Target flue gas oxygen (%)
pub const DEFAULT_O2_SETPOINT: f32 = 3.5;

/// No action while |error| stays within this band (%)
pub const DEFAULT_DEADBAND: f32 = 0.1;

pub const DEFAULT_KP: f32 = 0.8;
pub const DEFAULT_KI: f32 = 0.02;
pub const DEFAULT_KD: f32 = 0.1;

/// Largest correction the regulator may request (kPa)
pub const DEFAULT_MAX_CORRECTION: f32 = 0.8;

/// Regulator period (s)
pub const DEFAULT_CONTROL_INTERVAL_S: f32 = 10.0;

/// Relay pulse width (s)
pub const DEFAULT_IMPULSE_DURATION_S: f32 = 1.5;

/// Lowest air pressure at which the regulator may act (kPa)
pub const DEFAULT_PRESSURE_MIN_SAFE: f32 = 0.5;

/// Highest air pressure at which the regulator may act (kPa)
pub const DEFAULT_PRESSURE_MAX_SAFE: f32 = 9.0;
