// Note: SPI encoding based on https://github.com/smart-leds-rs/ws2812-spi-rs

use alloc::format;
use anyhow::{Result, anyhow};
use esp_hal::Blocking;
use esp_hal::spi::master::SpiDmaBus;

use common::io::LedTransmitter;

use crate::error_with_location;

pub const WS2812_RESET_BYTES: usize = 140;

/// SPI bytes needed per color byte: two WS2812 bits per SPI byte.
pub const SPI_BYTES_PER_BYTE: usize = 4;

/// Size of the SPI buffer for a strip whose color buffer is `color_bytes` long.
pub const fn spi_buffer_len(color_bytes: usize) -> usize {
    SPI_BYTES_PER_BYTE * color_bytes + WS2812_RESET_BYTES
}

/// Sends an already ordered (GRB) color buffer to a WS2812 strip over SPI.
///
/// The SPI clock must sit around 3.2 MHz .. 4.7 MHz for the bit patterns below.
pub struct Ws2812Spi<'spi> {
    spi: SpiDmaBus<'spi, Blocking>,
    encoded: &'static mut [u8],
}

impl<'spi> Ws2812Spi<'spi> {
    pub fn new(spi: SpiDmaBus<'spi, Blocking>, encoded: &'static mut [u8]) -> Self {
        Self { spi, encoded }
    }
}

impl LedTransmitter for Ws2812Spi<'_> {
    type Error = anyhow::Error;

    fn transmit(&mut self, colors: &[u8]) -> Result<()> {
        let len = spi_buffer_len(colors.len());
        if self.encoded.len() < len {
            return Err(error_with_location!(
                "SPI buffer of {} bytes is too small for {} color bytes",
                self.encoded.len(),
                colors.len()
            ));
        }

        encode_sequence(&mut self.encoded[..len], colors);
        self.spi
            .write(&self.encoded[..len])
            .map_err(|err| error_with_location!("Failed to write to neopixel: {:?}", err))
    }
}

// ----------------------------------------------------------------

fn encode_byte(out: &mut [u8], mut data: u8) {
    // Send two bits in one spi byte. High time first, then the low time
    // The maximum for T0H is 500ns, the minimum for one bit 1063 ns.
    // These result in the upper and lower spi frequency limits
    const PATTERNS: [u8; 4] = [0b1000_1000, 0b1000_1110, 0b1110_1000, 0b1110_1110];
    for slot in out.iter_mut().take(SPI_BYTES_PER_BYTE) {
        let bits = (data & 0b1100_0000) >> 6;
        *slot = PATTERNS[bits as usize];
        data <<= 2;
    }
}

/// Encodes `colors` followed by the reset (latch) tail.
fn encode_sequence(out: &mut [u8], colors: &[u8]) {
    let (data, reset) = out.split_at_mut(SPI_BYTES_PER_BYTE * colors.len());
    for (chunk, &byte) in data.chunks_exact_mut(SPI_BYTES_PER_BYTE).zip(colors) {
        encode_byte(chunk, byte);
    }
    reset.fill(0);
}
