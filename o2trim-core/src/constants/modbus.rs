//! Modbus RTU Relay Board
//!
//! The valve motor is driven by a four-relay board speaking Modbus RTU at
//! 9600 8N1. Only "write single coil" is used:
//!
//! ```text
//! byte  0        1      2        3        4         5         6       7
//!       [dev id] [0x05] [coil hi][coil lo][value hi][value lo][crc lo][crc hi]
//! ```

/// Slave address of the relay board
pub const RELAY_DEVICE_ID: u8 = 0x02;

/// Function code "write single coil"
pub const FN_WRITE_SINGLE_COIL: u8 = 0x05;

/// Coil value that energizes a relay
pub const COIL_ON: u16 = 0xFF00;

/// Coil value that de-energizes a relay
pub const COIL_OFF: u16 = 0x0000;

/// Number of relays on the board, addressed 1..=4
pub const RELAY_COUNT: u8 = 4;

/// Telegram length including CRC
pub const TELEGRAM_LEN: usize = 8;

/// CRC-16/MODBUS reflected polynomial
pub const CRC_POLYNOMIAL: u16 = 0xA001;

/// CRC-16/MODBUS initial register value
pub const CRC_INIT: u16 = 0xFFFF;

/// Silent interval after each telegram (ms)
pub const FRAME_GAP_MS: u32 = 50;
