use core::fmt::Debug;

use common::FFT_SIZE;
use common::io::{Capture, SampleSource};

/// Pins and peripherals of the I2S microphone input.
pub struct I2sPeripherals<'a> {
    pub i2s0: esp_hal::peripherals::I2S0<'a>,
    pub dma_ch0: esp_hal::peripherals::DMA_CH0<'a>,
    pub gpio0: esp_hal::peripherals::GPIO0<'a>, // MCLK
    pub gpio4: esp_hal::peripherals::GPIO4<'a>, // BCLK
    pub gpio6: esp_hal::peripherals::GPIO6<'a>, // WS
    pub gpio5: esp_hal::peripherals::GPIO5<'a>, // DIN
}

/// One stereo frame: two 24 bit samples in 32 bit slots, little endian.
const FRAME_BYTES: usize = 8;

/// Upper bound on DMA pops when throwing away stale data.
const MAX_DRAIN_POPS: usize = 16;

#[derive(Debug)]
pub enum CaptureError<E> {
    Dma(E),
    SampleRate { requested: u32, configured: u32 },
    Channel(u8),
    FrameTooLarge(usize),
    NotStarted,
    Incomplete { samples: usize, expected: usize },
}

/// [`SampleSource`] on top of a circular I2S DMA transfer.
///
/// `pop` copies whatever the DMA ring holds into the given buffer and
/// returns the byte count, 0 when nothing is pending. Samples are collected
/// while the caller polls [`SampleSource::busy`].
pub struct I2sCapture<F, E> {
    pop: F,
    sample_rate_hz: u32,
    raw: &'static mut [u8],
    /// bytes at the front of `raw` not decoded yet
    pending: usize,
    samples: [i16; FFT_SIZE],
    filled: usize,
    target: usize,
    channel: u8,
    active: bool,
    fault: Option<E>,
}

impl<F, E> I2sCapture<F, E>
where
    F: FnMut(&mut [u8]) -> Result<usize, E>,
{
    pub fn new(pop: F, sample_rate_hz: u32, raw: &'static mut [u8]) -> Self {
        Self {
            pop,
            sample_rate_hz,
            raw,
            pending: 0,
            samples: [0; FFT_SIZE],
            filled: 0,
            target: 0,
            channel: 0,
            active: false,
            fault: None,
        }
    }

    fn drain(&mut self) -> Result<(), E> {
        for _ in 0..MAX_DRAIN_POPS {
            if (self.pop)(&mut self.raw[..])? == 0 {
                break;
            }
        }
        self.pending = 0;
        Ok(())
    }

    fn pump(&mut self) -> Result<(), E> {
        let offset = self.channel as usize * 4;
        while self.filled < self.target {
            let got = (self.pop)(&mut self.raw[self.pending..])?;
            if got == 0 {
                break;
            }
            self.pending += got;

            let whole = self.pending / FRAME_BYTES * FRAME_BYTES;
            for frame in self.raw[..whole].chunks_exact(FRAME_BYTES) {
                if self.filled == self.target {
                    break;
                }
                let value = i32::from_le_bytes([
                    frame[offset],
                    frame[offset + 1],
                    frame[offset + 2],
                    frame[offset + 3],
                ]);
                // 24 bit sample down to 16 bit
                self.samples[self.filled] = (value >> 8) as i16;
                self.filled += 1;
            }

            // keep a trailing partial frame for the next pop
            self.raw.copy_within(whole..self.pending, 0);
            self.pending -= whole;
        }
        Ok(())
    }
}

impl<F, E> SampleSource for I2sCapture<F, E>
where
    F: FnMut(&mut [u8]) -> Result<usize, E>,
    E: Debug,
{
    type Error = CaptureError<E>;

    fn start(
        &mut self,
        channel: u8,
        sample_rate_hz: u32,
        frame_size: usize,
    ) -> Result<(), Self::Error> {
        if sample_rate_hz != self.sample_rate_hz {
            return Err(CaptureError::SampleRate {
                requested: sample_rate_hz,
                configured: self.sample_rate_hz,
            });
        }
        if channel > 1 {
            return Err(CaptureError::Channel(channel));
        }
        if frame_size > FFT_SIZE {
            return Err(CaptureError::FrameTooLarge(frame_size));
        }

        // the frame starts now, not with whatever piled up in the ring
        self.drain().map_err(CaptureError::Dma)?;
        self.channel = channel;
        self.target = frame_size;
        self.filled = 0;
        self.fault = None;
        self.active = true;
        Ok(())
    }

    fn busy(&mut self) -> bool {
        if !self.active || self.fault.is_some() {
            return false;
        }
        if let Err(err) = self.pump() {
            self.fault = Some(err);
            return false;
        }
        self.filled < self.target
    }

    fn buffer(&mut self, out: &mut [i16]) -> Result<Capture, Self::Error> {
        if let Some(err) = self.fault.take() {
            return Err(CaptureError::Dma(err));
        }
        if !self.active {
            return Err(CaptureError::NotStarted);
        }
        if self.filled < self.target {
            return Err(CaptureError::Incomplete {
                samples: self.filled,
                expected: self.target,
            });
        }

        let samples = self.filled.min(out.len());
        out[..samples].copy_from_slice(&self.samples[..samples]);
        let peak = self.samples[..samples]
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0);
        Ok(Capture { samples, peak })
    }

    fn close(&mut self) {
        self.active = false;
        self.filled = 0;
        self.pending = 0;
    }
}
