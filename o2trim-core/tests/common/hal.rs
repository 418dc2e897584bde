//! Simulated peripherals behind the embedded-hal and embedded-io traits

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, I2c, Operation};

/// Two ADS1115 converters answering on one simulated bus
///
/// `conversions[device][pair]` is what the conversion register returns while
/// that pair is selected.
#[derive(Default)]
pub struct SimI2c {
    pub addresses: [u8; 2],
    pub conversions: [[i16; 2]; 2],
    /// Config words written, as `(address, word)`
    pub config_writes: Vec<(u8, u16)>,
    selected: [Option<usize>; 2],
    pointer: [u8; 2],
    /// Reject every access to this address
    pub nack_address: Option<u8>,
}

impl SimI2c {
    pub fn new(conversions: [[i16; 2]; 2]) -> Self {
        Self { addresses: [0x48, 0x49], conversions, ..Self::default() }
    }

    fn device(&self, address: u8) -> Result<usize, i2c::ErrorKind> {
        if self.nack_address == Some(address) {
            return Err(i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address));
        }
        self.addresses
            .iter()
            .position(|&a| a == address)
            .ok_or(i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address))
    }
}

impl i2c::ErrorType for SimI2c {
    type Error = i2c::ErrorKind;
}

impl I2c for SimI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let device = self.device(address)?;

        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    self.pointer[device] = bytes[0];
                    if bytes[0] == 0x01 && bytes.len() == 3 {
                        let word = u16::from_be_bytes([bytes[1], bytes[2]]);
                        self.config_writes.push((address, word));
                        self.selected[device] = match (word >> 12) & 0x7 {
                            0 => Some(0),
                            3 => Some(1),
                            _ => None,
                        };
                    }
                }
                Operation::Read(buf) => {
                    if self.pointer[device] != 0x00 {
                        return Err(i2c::ErrorKind::Bus);
                    }
                    let pair = self.selected[device].ok_or(i2c::ErrorKind::Bus)?;
                    buf.copy_from_slice(&self.conversions[device][pair].to_be_bytes());
                }
            }
        }
        Ok(())
    }
}

/// Delay that only counts
#[derive(Default)]
pub struct CountingDelay {
    pub total_ns: u64,
    pub calls: usize,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
        self.calls += 1;
    }
}

/// Serial port capturing bytes, optionally in short chunks or refusing writes
#[derive(Default)]
pub struct SimPort {
    pub bytes: Vec<u8>,
    pub max_chunk: Option<usize>,
    pub accept_nothing: bool,
    pub fail: Option<embedded_io::ErrorKind>,
    pub flushes: usize,
}

impl embedded_io::ErrorType for SimPort {
    type Error = embedded_io::ErrorKind;
}

impl embedded_io::Write for SimPort {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if let Some(kind) = self.fail {
            return Err(kind);
        }
        if self.accept_nothing {
            return Ok(0);
        }
        let n = self.max_chunk.map_or(buf.len(), |max| max.min(buf.len()));
        self.bytes.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flushes += 1;
        Ok(())
    }
}
