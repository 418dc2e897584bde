//! Multiplexed Analog Front End
//!
//! Four differential inputs are spread over two ADS1115 converters on one I2C
//! bus. Each device has two input pairs and a single conversion register, so
//! a sweep reconfigures the multiplexer four times:
//!
//! ```text
//! for device in [0x48, 0x49]:
//!     for pair in [A (mux 0), B (mux 3)]:
//!         write  0x01 <- CONFIG_BASE | mux << 12     (big-endian)
//!         wait   settle time
//!         read   0x00 -> i16                         (big-endian)
//! ```
//!
//! The sweep is strictly sequential and takes at least four settle times.
//! Any failed register access aborts the whole sweep; there are no partial
//! results and no internal retries.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};

use crate::calibration::RawVoltages;
use crate::constants::adc::{
    CONFIG_BASE, MUX_PAIR_A, MUX_PAIR_B, MUX_SHIFT, REG_CONFIG, REG_CONVERSION, VOLTS_PER_LSB,
};
use crate::constants::{ADC_ADDRESSES, ADC_SETTLE_MS, CHANNEL_COUNT};
use crate::errors::{BusFault, ControlError, ControlResult};

/// Source of one sweep of raw channel voltages
pub trait SensorBus {
    /// Read channels 0..=3 in volts, signed
    fn read_all_channels(&mut self) -> ControlResult<RawVoltages>;
}

impl<T: SensorBus + ?Sized> SensorBus for &mut T {
    fn read_all_channels(&mut self) -> ControlResult<RawVoltages> {
        (**self).read_all_channels()
    }
}

/// Config register word selecting one input pair
pub const fn config_word(mux: u16) -> u16 {
    CONFIG_BASE | (mux << MUX_SHIFT)
}

/// Scale a raw conversion result to volts
pub fn raw_to_volts(raw: i16) -> f32 {
    raw as f32 * VOLTS_PER_LSB
}

/// Two ADS1115 converters sharing one bus
pub struct Ads1115Pair<I2C, D> {
    i2c: I2C,
    delay: D,
    addresses: [u8; 2],
    settle_ms: u32,
}

impl<I2C: I2c, D: DelayNs> Ads1115Pair<I2C, D> {
    /// Driver for the converters at the factory addresses
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_addresses(i2c, delay, ADC_ADDRESSES)
    }

    pub fn with_addresses(i2c: I2C, delay: D, addresses: [u8; 2]) -> Self {
        Self { i2c, delay, addresses, settle_ms: ADC_SETTLE_MS }
    }

    /// Override the settle time after a multiplexer change
    pub fn with_settle_ms(mut self, settle_ms: u32) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    /// Give back the bus and delay
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Select one pair, wait, read its conversion result
    fn read_pair(&mut self, address: u8, mux: u16) -> ControlResult<f32> {
        let [hi, lo] = config_word(mux).to_be_bytes();
        self.i2c
            .write(address, &[REG_CONFIG, hi, lo])
            .map_err(|e| sensor_fault(e.kind()))?;

        self.delay.delay_ms(self.settle_ms);

        let mut buf = [0u8; 2];
        self.i2c
            .write_read(address, &[REG_CONVERSION], &mut buf)
            .map_err(|e| sensor_fault(e.kind()))?;

        Ok(raw_to_volts(i16::from_be_bytes(buf)))
    }
}

fn sensor_fault(kind: embedded_hal::i2c::ErrorKind) -> ControlError {
    let fault = BusFault::from_i2c(kind);
    log_warn!("ADC register access failed: {}", fault);
    ControlError::SensorTransport { fault }
}

impl<I2C: I2c, D: DelayNs> SensorBus for Ads1115Pair<I2C, D> {
    fn read_all_channels(&mut self) -> ControlResult<RawVoltages> {
        let mut volts = [0.0f32; CHANNEL_COUNT];
        let addresses = self.addresses;
        let mut slot = 0;

        for address in addresses {
            for mux in [MUX_PAIR_A, MUX_PAIR_B] {
                volts[slot] = self.read_pair(address, mux)?;
                slot += 1;
            }
        }

        log_debug!(
            "ADC sweep: {} {} {} {}",
            volts[0],
            volts[1],
            volts[2],
            volts[3]
        );
        Ok(volts)
    }
}
