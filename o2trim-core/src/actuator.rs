//! Relay Board Actuation over Modbus RTU
//!
//! The air valve motor is driven by a four-relay board speaking a fixed
//! write-single-coil telegram:
//!
//! ```text
//! +-----------+------+---------+---------+----------+----------+--------+--------+
//! | device id | 0x05 | coil hi | coil lo | value hi | value lo | crc lo | crc hi |
//! +-----------+------+---------+---------+----------+----------+--------+--------+
//!    coil  = channel - 1
//!    value = 0xFF00 energize, 0x0000 de-energize
//!    crc   = CRC-16/MODBUS over the first six bytes
//! ```
//!
//! This module only encodes and sends single telegrams. Timed pulses are the
//! job of [`PulseScheduler`](crate::pulse::PulseScheduler).

use embedded_hal::delay::DelayNs;
use embedded_io::{Error as _, Write};

use crate::constants::modbus::{
    COIL_OFF, COIL_ON, CRC_INIT, CRC_POLYNOMIAL, FN_WRITE_SINGLE_COIL, FRAME_GAP_MS, TELEGRAM_LEN,
};
use crate::constants::control::{DEFAULT_DOWN_RELAY, DEFAULT_UP_RELAY};
use crate::constants::{RELAY_COUNT, RELAY_DEVICE_ID};
use crate::errors::{BusFault, ControlError, ControlResult};

/// Relay output number, always in `1..=4`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RelayChannel(u8);

impl RelayChannel {
    /// "More air" relay as wired on the burner
    pub const DEFAULT_UP: Self = Self(DEFAULT_UP_RELAY);
    /// "Less air" relay as wired on the burner
    pub const DEFAULT_DOWN: Self = Self(DEFAULT_DOWN_RELAY);

    pub fn new(channel: u8) -> ControlResult<Self> {
        if (1..=RELAY_COUNT).contains(&channel) {
            Ok(Self(channel))
        } else {
            Err(ControlError::InvalidChannel { channel })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based coil address on the wire
    pub fn coil(self) -> u16 {
        u16::from(self.0 - 1)
    }
}

impl TryFrom<u8> for RelayChannel {
    type Error = ControlError;

    fn try_from(channel: u8) -> ControlResult<Self> {
        Self::new(channel)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RelayChannel {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "relay {}", self.0)
    }
}

impl core::fmt::Display for RelayChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "relay {}", self.0)
    }
}

/// CRC-16/MODBUS, bitwise, no lookup table
pub fn modbus_crc(data: &[u8]) -> u16 {
    let mut crc = CRC_INIT;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC_POLYNOMIAL
            } else {
                crc >> 1
            };
        }
    }
    crc
}

/// Build the write-single-coil telegram for one relay
pub fn encode_write_coil(device_id: u8, channel: RelayChannel, energize: bool) -> [u8; TELEGRAM_LEN] {
    let [coil_hi, coil_lo] = channel.coil().to_be_bytes();
    let value = if energize { COIL_ON } else { COIL_OFF };
    let [value_hi, value_lo] = value.to_be_bytes();

    let mut frame = [device_id, FN_WRITE_SINGLE_COIL, coil_hi, coil_lo, value_hi, value_lo, 0, 0];
    let [crc_lo, crc_hi] = modbus_crc(&frame[..6]).to_le_bytes();
    frame[6] = crc_lo;
    frame[7] = crc_hi;
    frame
}

/// Anything that can switch one relay
pub trait ActuatorBus {
    fn set_relay(&mut self, channel: RelayChannel, energize: bool) -> ControlResult<()>;
}

impl<T: ActuatorBus + ?Sized> ActuatorBus for &mut T {
    fn set_relay(&mut self, channel: RelayChannel, energize: bool) -> ControlResult<()> {
        (**self).set_relay(channel, energize)
    }
}

/// Relay board on a serial line
pub struct ModbusRelay<W, D> {
    port: W,
    delay: D,
    device_id: u8,
    frame_gap_ms: u32,
}

impl<W: Write, D: DelayNs> ModbusRelay<W, D> {
    pub fn new(port: W, delay: D) -> Self {
        Self {
            port,
            delay,
            device_id: RELAY_DEVICE_ID,
            frame_gap_ms: FRAME_GAP_MS,
        }
    }

    pub fn with_device_id(mut self, device_id: u8) -> Self {
        self.device_id = device_id;
        self
    }

    /// Quiet time after each telegram
    pub fn with_frame_gap_ms(mut self, frame_gap_ms: u32) -> Self {
        self.frame_gap_ms = frame_gap_ms;
        self
    }

    pub fn release(self) -> (W, D) {
        (self.port, self.delay)
    }

    fn send(&mut self, frame: &[u8]) -> ControlResult<()> {
        let mut rest = frame;
        while !rest.is_empty() {
            match self.port.write(rest) {
                Ok(0) => return Err(actuator_fault(BusFault::WriteZero)),
                Ok(n) => rest = &rest[n..],
                Err(e) => return Err(actuator_fault(BusFault::from_io(e.kind()))),
            }
        }
        self.port
            .flush()
            .map_err(|e| actuator_fault(BusFault::from_io(e.kind())))
    }
}

fn actuator_fault(fault: BusFault) -> ControlError {
    log_warn!("Relay telegram failed: {}", fault);
    ControlError::ActuatorTransport { fault }
}

impl<W: Write, D: DelayNs> ActuatorBus for ModbusRelay<W, D> {
    fn set_relay(&mut self, channel: RelayChannel, energize: bool) -> ControlResult<()> {
        let frame = encode_write_coil(self.device_id, channel, energize);
        self.send(&frame)?;
        self.delay.delay_ms(self.frame_gap_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_reference_vector() {
        let crc = modbus_crc(&[0x02, 0x05, 0x00, 0x00, 0xFF, 0x00]);
        assert_eq!(crc.to_le_bytes(), [0x8C, 0x09]);
    }

    #[test]
    fn crc_of_nothing_is_init() {
        assert_eq!(modbus_crc(&[]), 0xFFFF);
    }

    #[test]
    fn relay_four_on_and_off() {
        let relay = RelayChannel::new(4).unwrap();
        assert_eq!(
            encode_write_coil(0x02, relay, true),
            [0x02, 0x05, 0x00, 0x03, 0xFF, 0x00, 0x7C, 0x09]
        );
        assert_eq!(
            encode_write_coil(0x02, relay, false),
            [0x02, 0x05, 0x00, 0x03, 0x00, 0x00, 0x3D, 0xF9]
        );
    }

    #[test]
    fn relay_one_uses_coil_zero() {
        let frame = encode_write_coil(RELAY_DEVICE_ID, RelayChannel::new(1).unwrap(), true);
        assert_eq!(&frame[2..4], &[0x00, 0x00]);
        assert_eq!(&frame[6..], &[0x8C, 0x09]);
    }

    #[test]
    fn channel_range() {
        assert_eq!(RelayChannel::new(0), Err(ControlError::InvalidChannel { channel: 0 }));
        assert_eq!(RelayChannel::try_from(5), Err(ControlError::InvalidChannel { channel: 5 }));
        assert_eq!(RelayChannel::new(3).map(RelayChannel::coil), Ok(2));
    }
}
