//! Interfaces of the hardware collaborators around the pipeline.

use core::fmt::Debug;

/// Polling interval used by both sides of the frame exchange.
pub const POLL_INTERVAL_US: u32 = 50;

/// Result of one completed capture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capture {
    /// number of samples written to the caller's buffer
    pub samples: usize,
    /// largest absolute sample value in the frame
    pub peak: u16,
}

/// Audio capture driver, synchronous through polling.
pub trait SampleSource {
    type Error: Debug;

    fn start(&mut self, channel: u8, sample_rate_hz: u32, frame_size: usize)
    -> Result<(), Self::Error>;

    /// `true` until a full frame is available.
    fn busy(&mut self) -> bool;

    fn buffer(&mut self, out: &mut [i16]) -> Result<Capture, Self::Error>;

    fn close(&mut self);
}

/// Real-valued frequency transform producing one energy per bin.
pub trait SpectrumAnalyzer {
    fn transform(&mut self, samples: &[i16], windowed: bool, out: &mut [f32]);
}

/// Sends a finished byte buffer to the strip, blocking until it is out.
pub trait LedTransmitter {
    type Error: Debug;

    fn transmit(&mut self, buffer: &[u8]) -> Result<(), Self::Error>;
}

/// Free-running microsecond counter for timing diagnostics.
pub trait MonotonicClock {
    fn now_us(&self) -> u64;
}

impl<T: LedTransmitter + ?Sized> LedTransmitter for &mut T {
    type Error = T::Error;

    fn transmit(&mut self, buffer: &[u8]) -> Result<(), Self::Error> {
        (**self).transmit(buffer)
    }
}
