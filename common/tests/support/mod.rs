#![allow(dead_code)]

use std::convert::Infallible;
use std::time::{Duration, Instant};

use common::FFT_SIZE;
use common::io::{LedTransmitter, MonotonicClock};
use embedded_hal::delay::DelayNs;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Host stand-in for the firmware's busy-wait delay.
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns as u64));
    }
}

/// Keeps a copy of every transmitted frame.
#[derive(Default)]
pub struct RecordingStrip {
    pub frames: Vec<Vec<u8>>,
}

impl LedTransmitter for RecordingStrip {
    type Error = Infallible;

    fn transmit(&mut self, buffer: &[u8]) -> Result<(), Infallible> {
        self.frames.push(buffer.to_vec());
        Ok(())
    }
}

pub struct HostClock(Instant);

impl HostClock {
    pub fn new() -> Self {
        Self(Instant::now())
    }
}

impl MonotonicClock for HostClock {
    fn now_us(&self) -> u64 {
        self.0.elapsed().as_micros() as u64
    }
}

/// One frame of a sine centred on `bin`, peak amplitude `amplitude`.
pub fn sine_frame(bin: usize, amplitude: f32) -> [i16; FFT_SIZE] {
    std::array::from_fn(|i| {
        let phase = 2.0 * std::f32::consts::PI * (bin * i) as f32 / FFT_SIZE as f32;
        (amplitude * phase.sin()).round() as i16
    })
}
