//! Common test doubles for integration tests
//!
//! This module provides:
//! - A scripted sensor bus with injectable faults and latency
//! - A relay board that records every telegram
//! - Helpers turning process values into raw voltages under the factory
//!   calibration

#![allow(dead_code)]

use o2trim_core::{
    ActuatorBus, BusFault, ControlError, ControlLoop, ControlResult, ControllerConfig, FixedTime,
    RawVoltages, RelayChannel, SensorBus,
};

pub mod hal;

/// Raw voltages producing the given process values with factory calibration
///
/// Both oxygen probes read the same value.
pub fn voltages(o2: f32, gas_flow: f32, air_pressure: f32) -> RawVoltages {
    [o2 / 25.0, o2 / 25.0, gas_flow / 100.0, air_pressure / 10.0]
}

/// Normal firing: O2 on setpoint, mid gas flow, pressure well inside the window
pub fn steady() -> RawVoltages {
    voltages(3.5, 40.0, 3.5)
}

/// Sensor bus returning a settable sweep
pub struct MockSensors<'a> {
    pub readings: RawVoltages,
    pub fail: Option<BusFault>,
    pub reads: usize,
    /// Clock advanced by `latency_ms` on each sweep
    pub latency: Option<(&'a FixedTime, u64)>,
}

impl<'a> MockSensors<'a> {
    pub fn new(readings: RawVoltages) -> Self {
        Self { readings, fail: None, reads: 0, latency: None }
    }

    pub fn slow(readings: RawVoltages, clock: &'a FixedTime, latency_ms: u64) -> Self {
        Self { latency: Some((clock, latency_ms)), ..Self::new(readings) }
    }
}

impl SensorBus for MockSensors<'_> {
    fn read_all_channels(&mut self) -> ControlResult<RawVoltages> {
        self.reads += 1;
        if let Some((clock, ms)) = self.latency {
            clock.advance(ms);
        }
        match self.fail {
            Some(fault) => Err(ControlError::SensorTransport { fault }),
            None => Ok(self.readings),
        }
    }
}

/// Relay board recording telegrams as `(relay, energize)`
#[derive(Default)]
pub struct MockRelays {
    pub telegrams: Vec<(u8, bool)>,
    pub on: [bool; 4],
    /// Number of upcoming telegrams to reject
    pub fail_next: usize,
}

impl MockRelays {
    pub fn is_on(&self, relay: u8) -> bool {
        self.on[usize::from(relay - 1)]
    }
}

impl ActuatorBus for MockRelays {
    fn set_relay(&mut self, channel: RelayChannel, energize: bool) -> ControlResult<()> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(ControlError::ActuatorTransport { fault: BusFault::Nack });
        }
        self.on[usize::from(channel.get() - 1)] = energize;
        self.telegrams.push((channel.get(), energize));
        Ok(())
    }
}

pub type TestLoop<'a> = ControlLoop<MockSensors<'a>, MockRelays, ControllerConfig, &'a FixedTime>;

/// Control loop on mocks with the given configuration
pub fn control_loop<'a>(
    readings: RawVoltages,
    config: ControllerConfig,
    clock: &'a FixedTime,
) -> TestLoop<'a> {
    ControlLoop::new(MockSensors::new(readings), MockRelays::default(), config, clock)
}

/// Factory configuration with a proportional-only regulator
pub fn p_only_config(kp: f32) -> ControllerConfig {
    let mut config = ControllerConfig::default();
    config.pid.kp = kp;
    config.pid.ki = 0.0;
    config.pid.kd = 0.0;
    config
}
