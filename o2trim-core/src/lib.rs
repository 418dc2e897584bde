//! Oxygen trim control core
//!
//! Closes the loop between flue gas oxygen and combustion air on a gas burner:
//! reads four analog transmitters through two multiplexed ADCs, calibrates
//! them, checks the air pressure interlock, computes a feed-forward baseline
//! and a PID correction, and pulses the air valve motor through a Modbus
//! relay board.
//!
//! Key constraints:
//! - Runs on the same small controller as the web front end
//! - No heap allocation, no sleeping in the control path
//! - Every failure ends one cycle, never the process
//!
//! ```no_run
//! use o2trim_core::{ControlLoop, ControllerConfig, CycleResult, MonotonicTime};
//! # use o2trim_core::{ActuatorBus, RelayChannel, SensorBus, ControlResult, RawVoltages};
//! # struct Adc;
//! # impl SensorBus for Adc {
//! #     fn read_all_channels(&mut self) -> ControlResult<RawVoltages> { Ok([0.14; 4]) }
//! # }
//! # struct Board;
//! # impl ActuatorBus for Board {
//! #     fn set_relay(&mut self, _: RelayChannel, _: bool) -> ControlResult<()> { Ok(()) }
//! # }
//!
//! let mut control = ControlLoop::new(Adc, Board, ControllerConfig::default(), MonotonicTime::new());
//!
//! loop {
//!     match control.run_once() {
//!         Ok(CycleResult::Applied(report)) => println!("{:?}", report.action),
//!         Ok(_) => {}
//!         Err(e) => eprintln!("cycle failed: {}", e),
//!     }
//!     control.poll_actuator().ok();
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod macros;

pub mod actuator;
pub mod calibration;
pub mod config;
pub mod constants;
pub mod control;
pub mod errors;
pub mod lookup;
pub mod pid;
pub mod pulse;
pub mod safety;
pub mod sensor;
pub mod time;

// Public API
pub use actuator::{encode_write_coil, modbus_crc, ActuatorBus, ModbusRelay, RelayChannel};
pub use calibration::{apply_calibration, ChannelCalibration, ProcessValues, RawVoltages};
pub use config::{ConfigStore, ControllerConfig, PidConfig};
pub use control::{ControlLoop, CycleReport, CycleResult, Sample, SkipReason};
pub use errors::{BusFault, ControlError, ControlResult};
pub use lookup::{lookup, FeedForwardPoint, FeedForwardTable};
pub use pid::{Action, Correction, PidRegulator, RegulatorState};
pub use pulse::{ActivePulse, PulseScheduler};
pub use safety::{SafetyGuard, SafetyWarning};
pub use sensor::{Ads1115Pair, SensorBus};
pub use time::{FixedTime, TimeSource, Timestamp};

#[cfg(feature = "std")]
pub use time::MonotonicTime;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
