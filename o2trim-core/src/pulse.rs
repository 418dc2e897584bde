//! Non-blocking Relay Pulses
//!
//! A pulse is "energize now, de-energize at `release_at`". Instead of
//! sleeping through the pulse, the scheduler records the deadline and the
//! host polls it:
//!
//! ```text
//! start(UP, now=1000, 1500 ms)   -> relay 4 on, release_at = 2500
//! poll(now=2000)                 -> WouldBlock
//! poll(now=2500)                 -> relay 4 off, Ok(Some(relay 4))
//! poll(now=2600)                 -> Ok(None)
//! ```
//!
//! At most one pulse is in flight. Starting a pulse on another relay first
//! de-energizes the in-flight one, so the UP and DOWN relays are never on
//! together. A relay is only forgotten once its de-energize telegram went
//! through: failed releases stay pending and are retried by the next poll.

use crate::actuator::{ActuatorBus, RelayChannel};
use crate::errors::{ControlError, ControlResult};
use crate::time::Timestamp;

/// Relay currently held energized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ActivePulse {
    pub channel: RelayChannel,
    pub release_at: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub struct PulseScheduler {
    active: Option<ActivePulse>,
}

impl PulseScheduler {
    pub const fn new() -> Self {
        Self { active: None }
    }

    pub fn active(&self) -> Option<ActivePulse> {
        self.active
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Energize `channel` and schedule its release `duration_ms` from `now`.
    ///
    /// Restarting the in-flight relay extends its deadline. A zero duration
    /// releases within the same call. If the energize telegram fails the
    /// relay state is unknown, so a release is scheduled immediately and
    /// attempted once before the error is returned.
    pub fn start<A: ActuatorBus>(
        &mut self,
        bus: &mut A,
        channel: RelayChannel,
        now: Timestamp,
        duration_ms: Timestamp,
    ) -> ControlResult<()> {
        if let Some(previous) = self.active {
            if previous.channel != channel {
                log_warn!(
                    "Preempting pulse on relay {} for relay {}",
                    previous.channel.get(),
                    channel.get()
                );
                bus.set_relay(previous.channel, false)?;
                self.active = None;
            }
        }

        if let Err(e) = bus.set_relay(channel, true) {
            self.active = Some(ActivePulse { channel, release_at: now });
            let _ = self.release_now(bus);
            return Err(e);
        }

        let release_at = now.saturating_add(duration_ms);
        log_debug!("Pulse on relay {} until {}", channel.get(), release_at);
        self.active = Some(ActivePulse { channel, release_at });
        if duration_ms == 0 {
            self.release_now(bus)?;
        }
        Ok(())
    }

    /// De-energize the in-flight relay once its deadline has passed.
    ///
    /// - `Ok(Some(channel))`: released on this call
    /// - `Ok(None)`: nothing in flight
    /// - `WouldBlock`: pulse still running
    /// - `Other(e)`: release failed, still pending
    pub fn poll<A: ActuatorBus>(
        &mut self,
        bus: &mut A,
        now: Timestamp,
    ) -> nb::Result<Option<RelayChannel>, ControlError> {
        match self.active {
            None => Ok(None),
            Some(pulse) if now < pulse.release_at => Err(nb::Error::WouldBlock),
            Some(_) => self.release_now(bus).map_err(nb::Error::Other),
        }
    }

    /// De-energize the in-flight relay regardless of its deadline
    pub fn release_now<A: ActuatorBus>(&mut self, bus: &mut A) -> ControlResult<Option<RelayChannel>> {
        let Some(pulse) = self.active else {
            return Ok(None);
        };
        bus.set_relay(pulse.channel, false)?;
        log_debug!("Released relay {}", pulse.channel.get());
        self.active = None;
        Ok(Some(pulse.channel))
    }

    /// Forget the pending release of `channel` without touching the bus.
    ///
    /// Returns whether a pulse was dropped.
    pub fn cancel(&mut self, channel: RelayChannel) -> bool {
        match self.active {
            Some(pulse) if pulse.channel == channel => {
                self.active = None;
                true
            }
            _ => false,
        }
    }
}
