//! ADS1115 Analog Front End
//!
//! Two ADS1115 converters share one I2C bus. Each one measures two
//! differential pairs, giving the four process channels:
//!
//! ```text
//! Device   Address   Pair A (AIN0-AIN1)   Pair B (AIN2-AIN3)
//! -------------------------------------------------------------
//! ADC 1    0x48      ch0  O2 probe 1      ch1  O2 probe 2
//! ADC 2    0x49      ch2  gas flow        ch3  air pressure
//! ```
//!
//! Source: TI ADS1115 datasheet (SBAS444), section 9.6

/// Number of analog process channels
pub const CHANNEL_COUNT: usize = 4;

/// I2C addresses of the two converters (ADDR pin to GND, ADDR pin to VDD)
pub const ADC_ADDRESSES: [u8; 2] = [0x48, 0x49];

/// Conversion result register (16-bit, big-endian, two's complement)
pub const REG_CONVERSION: u8 = 0x00;

/// Configuration register (16-bit, big-endian)
pub const REG_CONFIG: u8 = 0x01;

/// Base configuration word.
///
/// ```text
/// bit 15      OS = 1        start a single conversion
/// bits 11:9   PGA = 000     +-6.144 V full scale
/// bit 8       MODE = 1      single-shot
/// bits 7:5    DR = 111      860 SPS
/// bits 1:0    COMP_QUE = 11 comparator disabled
/// ```
pub const CONFIG_BASE: u16 = (1 << 15) | (1 << 8) | (7 << 5) | 3;

/// Bit offset of the input multiplexer field
pub const MUX_SHIFT: u16 = 12;

/// Multiplexer code for AIN0-AIN1
pub const MUX_PAIR_A: u16 = 0;

/// Multiplexer code for AIN2-AIN3
pub const MUX_PAIR_B: u16 = 3;

/// Full scale range of the PGA setting above (volts)
pub const FULL_SCALE_RANGE_V: f32 = 6.144;

/// Volts per LSB of the conversion register
pub const VOLTS_PER_LSB: f32 = FULL_SCALE_RANGE_V / 32768.0;

/// Wait after writing the config register before the result is valid (ms)
pub const ADC_SETTLE_MS: u32 = 2;
