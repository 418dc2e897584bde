//! Oxygen Trim Control Loop
//!
//! ## Cycle
//!
//! An external scheduler calls [`ControlLoop::run_once`] repeatedly. Each call
//! runs to completion and never sleeps:
//!
//! ```text
//! service due pulse release
//!   -> fetch PID section        (Disabled if switched off)
//!   -> validate                 (InvalidConfig)
//!   -> rate limit               (Skipped)
//!   -> sensor sweep             (transport error / Timeout)
//!   -> calibrate
//!   -> pressure interlock       (Warning, in-flight pulse cut)
//!   -> reject NaN / inf O2, gas (NonFiniteReading)
//!   -> feed-forward baseline
//!   -> PID step
//!   -> start pulse if UP/DOWN   (transport error / Timeout)
//!   -> commit regulator state   -> Applied
//! ```
//!
//! Configuration is re-fetched from the [`ConfigStore`] on every call.
//!
//! ## Failure Policy
//!
//! Every error ends the current cycle only. The regulator state is committed
//! after actuation succeeded, so a failed cycle leaves it exactly as it was
//! and the next cadence retries from the same point. Bus operations are timed
//! against the loop's clock; a sweep or telegram slower than the bus timeout
//! is a [`ControlError::Timeout`].
//!
//! ## Threading
//!
//! The loop owns the regulator state and the actuator. Sharing it between a
//! control task and a request handler means wrapping the whole loop in one
//! lock, never the parts.

use crate::actuator::{ActuatorBus, RelayChannel};
use crate::calibration::{apply_calibration, ProcessValues, RawVoltages};
use crate::config::ConfigStore;
use crate::constants::control::DEFAULT_BUS_TIMEOUT_MS;
use crate::errors::{ControlError, ControlResult};
use crate::pid::{Action, PidRegulator, RegulatorState};
use crate::pulse::{ActivePulse, PulseScheduler};
use crate::safety::SafetyWarning;
use crate::sensor::SensorBus;
use crate::time::{TimeSource, Timestamp};

/// Why a cycle did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SkipReason {
    /// The control interval has not elapsed yet
    RateLimited { remaining_ms: Timestamp },
}

/// Everything one applied cycle computed
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CycleReport {
    pub gas_flow: f32,
    /// Feed-forward baseline for the measured gas flow
    pub air_target_base: f32,
    pub air_pressure: f32,
    pub o2_avg: f32,
    pub error: f32,
    pub correction: f32,
    pub action: Action,
    /// Relay pulsed by this cycle
    pub pulse: Option<RelayChannel>,
}

/// Outcome of one [`ControlLoop::run_once`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CycleResult {
    Disabled,
    Skipped(SkipReason),
    Warning(SafetyWarning),
    Applied(CycleReport),
}

/// One live reading, no control
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sample {
    pub raw: RawVoltages,
    pub values: ProcessValues,
}

/// Actuator access timed against the loop clock
struct TimedActuator<'a, A, T> {
    bus: &'a mut A,
    clock: &'a T,
    limit_ms: u64,
}

impl<A: ActuatorBus, T: TimeSource> ActuatorBus for TimedActuator<'_, A, T> {
    fn set_relay(&mut self, channel: RelayChannel, energize: bool) -> ControlResult<()> {
        let started = self.clock.now();
        self.bus.set_relay(channel, energize)?;
        check_elapsed(self.clock, started, self.limit_ms)
    }
}

fn check_elapsed<T: TimeSource>(clock: &T, started: Timestamp, limit_ms: u64) -> ControlResult<()> {
    let elapsed_ms = clock.now().saturating_sub(started);
    if elapsed_ms > limit_ms {
        log_warn!("Bus operation took {} ms, limit {} ms", elapsed_ms, limit_ms);
        return Err(ControlError::Timeout { elapsed_ms, limit_ms });
    }
    Ok(())
}

/// Closed-loop oxygen trim controller
pub struct ControlLoop<S, A, C, T> {
    sensors: S,
    actuator: A,
    config: C,
    clock: T,
    state: RegulatorState,
    pulses: PulseScheduler,
    up_relay: RelayChannel,
    down_relay: RelayChannel,
    bus_timeout_ms: u64,
}

impl<S, A, C, T> ControlLoop<S, A, C, T>
where
    S: SensorBus,
    A: ActuatorBus,
    C: ConfigStore,
    T: TimeSource,
{
    pub fn new(sensors: S, actuator: A, config: C, clock: T) -> Self {
        Self {
            sensors,
            actuator,
            config,
            clock,
            state: RegulatorState::default(),
            pulses: PulseScheduler::new(),
            up_relay: RelayChannel::DEFAULT_UP,
            down_relay: RelayChannel::DEFAULT_DOWN,
            bus_timeout_ms: DEFAULT_BUS_TIMEOUT_MS,
        }
    }

    /// Assign the "more air" and "less air" relays
    pub fn with_relays(mut self, up: RelayChannel, down: RelayChannel) -> ControlResult<Self> {
        if up == down {
            return Err(ControlError::InvalidConfig {
                reason: "UP and DOWN must use different relays",
            });
        }
        self.up_relay = up;
        self.down_relay = down;
        Ok(self)
    }

    pub fn with_bus_timeout_ms(mut self, bus_timeout_ms: u64) -> Self {
        self.bus_timeout_ms = bus_timeout_ms;
        self
    }

    /// Resume from a known regulator state
    pub fn with_state(mut self, state: RegulatorState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &RegulatorState {
        &self.state
    }

    pub fn active_pulse(&self) -> Option<ActivePulse> {
        self.pulses.active()
    }

    pub fn relays(&self) -> (RelayChannel, RelayChannel) {
        (self.up_relay, self.down_relay)
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut C {
        &mut self.config
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn clock(&self) -> &T {
        &self.clock
    }

    pub fn into_parts(self) -> (S, A, C, T) {
        (self.sensors, self.actuator, self.config, self.clock)
    }

    /// Run one control cycle
    pub fn run_once(&mut self) -> ControlResult<CycleResult> {
        self.poll_actuator()?;

        let pid = self.config.get_pid_config();
        if !pid.enabled {
            log_debug!("Control disabled");
            return Ok(CycleResult::Disabled);
        }
        pid.validate()?;

        let now = self.clock.now();
        let remaining_ms = self.state.remaining_ms(now, pid.control_interval_ms());
        if remaining_ms > 0 {
            log_debug!("Rate limited, {} ms to next cycle", remaining_ms);
            return Ok(CycleResult::Skipped(SkipReason::RateLimited { remaining_ms }));
        }

        let raw = self.read_sensors()?;
        let values = apply_calibration(&raw, &self.config.get_calibration());

        if let Err(warning) = pid.safety_guard().check(values.air_pressure) {
            log_warn!(
                "Interlock: pressure {} outside [{}, {}]",
                values.air_pressure,
                pid.pressure_min_safe,
                pid.pressure_max_safe
            );
            if let Err(e) = self.release_pulse() {
                log_warn!("Could not cut pulse: {}", e);
            }
            return Ok(CycleResult::Warning(warning));
        }

        for (quantity, value) in [("O2", values.o2_avg), ("gas flow", values.gas_flow)] {
            if !value.is_finite() {
                log_warn!("Non-finite {} reading, cycle dropped", quantity);
                return Err(ControlError::NonFiniteReading { quantity });
            }
        }

        let air_target_base = self.config.get_feed_forward_table().lookup(values.gas_flow);

        let (next_state, step) = PidRegulator::new(&pid).update(&self.state, values.o2_avg, now);

        let pulse = match step.action {
            Action::Hold => None,
            Action::Up => Some(self.up_relay),
            Action::Down => Some(self.down_relay),
        };
        if let Some(channel) = pulse {
            let mut bus = TimedActuator {
                bus: &mut self.actuator,
                clock: &self.clock,
                limit_ms: self.bus_timeout_ms,
            };
            self.pulses.start(&mut bus, channel, now, pid.impulse_duration_ms())?;
        }

        self.state = next_state;

        log_info!(
            "O2 {} error {} correction {} action {}",
            values.o2_avg,
            step.error,
            step.correction,
            step.action.as_str()
        );

        Ok(CycleResult::Applied(CycleReport {
            gas_flow: values.gas_flow,
            air_target_base,
            air_pressure: values.air_pressure,
            o2_avg: values.o2_avg,
            error: step.error,
            correction: step.correction,
            action: step.action,
            pulse,
        }))
    }

    /// Release the in-flight pulse if it is due.
    ///
    /// Returns the relay released by this call. Hosts call this between
    /// cycles for release timing tighter than the cycle cadence.
    pub fn poll_actuator(&mut self) -> ControlResult<Option<RelayChannel>> {
        let now = self.clock.now();
        let mut bus = TimedActuator {
            bus: &mut self.actuator,
            clock: &self.clock,
            limit_ms: self.bus_timeout_ms,
        };
        match self.pulses.poll(&mut bus, now) {
            Ok(released) => Ok(released),
            Err(nb::Error::WouldBlock) => Ok(None),
            Err(nb::Error::Other(e)) => Err(e),
        }
    }

    /// Switch one relay by hand.
    ///
    /// A manual command on the relay of the in-flight pulse replaces that
    /// pulse: its scheduled release is dropped.
    pub fn set_relay(&mut self, channel: u8, energize: bool) -> ControlResult<()> {
        let channel = RelayChannel::new(channel)?;
        let mut bus = TimedActuator {
            bus: &mut self.actuator,
            clock: &self.clock,
            limit_ms: self.bus_timeout_ms,
        };
        bus.set_relay(channel, energize)?;
        if self.pulses.cancel(channel) {
            log_info!("Manual command on relay {} replaced running pulse", channel.get());
        }
        Ok(())
    }

    /// Read and calibrate all channels without running control
    pub fn sample(&mut self) -> ControlResult<Sample> {
        let raw = self.read_sensors()?;
        let values = apply_calibration(&raw, &self.config.get_calibration());
        Ok(Sample { raw, values })
    }

    /// De-energize the in-flight relay, if any
    pub fn shutdown(&mut self) -> ControlResult<Option<RelayChannel>> {
        self.release_pulse()
    }

    fn release_pulse(&mut self) -> ControlResult<Option<RelayChannel>> {
        let mut bus = TimedActuator {
            bus: &mut self.actuator,
            clock: &self.clock,
            limit_ms: self.bus_timeout_ms,
        };
        self.pulses.release_now(&mut bus)
    }

    fn read_sensors(&mut self) -> ControlResult<RawVoltages> {
        let started = self.clock.now();
        let raw = self.sensors.read_all_channels()?;
        check_elapsed(&self.clock, started, self.bus_timeout_ms)?;
        Ok(raw)
    }
}
