//! The two pieces of hardware we talk to: an ADC and a digital trigger line.
//!
//! Both are held exclusively for the life of the process. Implementations
//! release their underlying device when dropped, so every exit path (normal
//! return, error, interrupt) gives the handles back.

use std::io;

use tracing::debug;

/// A single channel read off of an analog to digital converter
pub trait Adc {
    /// Largest code the converter can produce
    fn max_code(&self) -> u16;
    /// One synchronous conversion, no internal retry
    fn read_channel(&mut self, channel: u8) -> io::Result<u16>;
}

impl<A: Adc + ?Sized> Adc for &mut A {
    fn max_code(&self) -> u16 {
        (**self).max_code()
    }

    fn read_channel(&mut self, channel: u8) -> io::Result<u16> {
        (**self).read_channel(channel)
    }
}

/// Logic level of the trigger line
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Level {
    High,
    Low,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

pub trait TriggerInput {
    fn read_level(&mut self) -> io::Result<Level>;
}

/// Full-duplex three byte SPI exchange. The OS binding lives outside this crate.
pub trait SpiTransfer {
    fn transfer(&mut self, buf: &mut [u8; 3]) -> io::Result<()>;
}

/// MCP3008 8-channel, 10-bit SAR ADC
pub struct Mcp3008<S: SpiTransfer> {
    spi: S,
}

impl<S: SpiTransfer> Mcp3008<S> {
    pub const CHANNELS: u8 = 8;
    pub const MAX_CODE: u16 = 1023;

    pub fn new(spi: S) -> Self {
        Self { spi }
    }
}

/// Build the request frame for a single-ended read of `channel`
pub fn mcp3008_request(channel: u8) -> [u8; 3] {
    // Start bit, then SGL/DIFF=1 and the three channel select bits
    [1, (8 + channel) << 4, 0]
}

/// Pull the 10 bit result out of the response frame
pub fn mcp3008_decode(rx: &[u8; 3]) -> u16 {
    (((rx[1] & 3) as u16) << 8) | rx[2] as u16
}

impl<S: SpiTransfer> Adc for Mcp3008<S> {
    fn max_code(&self) -> u16 {
        Self::MAX_CODE
    }

    fn read_channel(&mut self, channel: u8) -> io::Result<u16> {
        if channel >= Self::CHANNELS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("MCP3008 has no channel {}", channel),
            ));
        }
        let mut buf = mcp3008_request(channel);
        self.spi.transfer(&mut buf)?;
        Ok(mcp3008_decode(&buf))
    }
}

impl<S: SpiTransfer> Drop for Mcp3008<S> {
    fn drop(&mut self) {
        debug!("Releasing MCP3008 SPI handle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes a canned response and remembers the last request
    struct FakeSpi {
        response: [u8; 3],
        last_request: Option<[u8; 3]>,
    }

    impl SpiTransfer for FakeSpi {
        fn transfer(&mut self, buf: &mut [u8; 3]) -> io::Result<()> {
            self.last_request = Some(*buf);
            *buf = self.response;
            Ok(())
        }
    }

    #[test]
    fn test_request_frame() {
        assert_eq!([1, 0x80, 0], mcp3008_request(0));
        assert_eq!([1, 0xF0, 0], mcp3008_request(7));
    }

    #[test]
    fn test_decode_masks_high_bits() {
        // Only the low two bits of the second byte belong to the result
        assert_eq!(1023, mcp3008_decode(&[0xFF, 0xFF, 0xFF]));
        assert_eq!(0x1A5, mcp3008_decode(&[0x00, 0xF9, 0xA5]));
    }

    #[test]
    fn test_read_channel() {
        let spi = FakeSpi {
            response: [0, 0x02, 0x00],
            last_request: None,
        };
        let mut adc = Mcp3008::new(spi);
        assert_eq!(512, adc.read_channel(3).unwrap());
        assert_eq!(Some([1, 0xB0, 0]), adc.spi.last_request);
    }

    #[test]
    fn test_bad_channel() {
        let spi = FakeSpi {
            response: [0; 3],
            last_request: None,
        };
        let mut adc = Mcp3008::new(spi);
        assert!(adc.read_channel(8).is_err());
        assert!(adc.spi.last_request.is_none());
    }
}
