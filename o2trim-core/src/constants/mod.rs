//! Constants for the O2Trim control core
//!
//! All wire-level numbers and factory defaults live here, with the datasheet
//! or wiring fact they come from.
//!
//! ## Organization
//!
//! - **adc**: ADS1115 registers, addresses and conversion scale
//! - **modbus**: relay board telegram layout and CRC parameters
//! - **control**: regulator thresholds, timing limits and factory defaults

/// ADS1115 analog front end register map and scaling.
pub mod adc;

/// Modbus RTU relay board telegram constants.
pub mod modbus;

/// Regulator thresholds, timing limits and factory defaults.
pub mod control;

pub use adc::{ADC_ADDRESSES, ADC_SETTLE_MS, FULL_SCALE_RANGE_V, CHANNEL_COUNT};
pub use modbus::{RELAY_COUNT, RELAY_DEVICE_ID};
pub use control::{ACTION_THRESHOLD, CALIBRATION_EPSILON, FEED_FORWARD_POINTS};
