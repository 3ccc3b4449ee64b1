#![no_std]

//! Signal-to-light pipeline shared by the firmware and the host tests.
//!
//! Raw samples go through [`fft::RealFft`] into a bin-energy spectrum, the
//! [`aggregator::BandAggregator`] turns that into one 0..=16 level per band,
//! [`peak_hold::PeakHold`] tracks the decaying maxima and
//! [`render::MatrixRenderer`] writes the bars into the LED byte buffer.
//! [`exchange`] moves frames between the capture core and the render core.

extern crate alloc;

pub mod agc;
pub mod aggregator;
pub mod bands;
pub mod calibration;
pub mod config;
pub mod config_presets;
pub mod error;
pub mod exchange;
pub mod fft;
pub mod io;
pub mod palette;
pub mod peak_hold;
pub mod pipeline;
pub mod pixel_map;
pub mod render;

pub use error::ConfigError;

/// Number of displayed bands (one matrix column each).
pub const NUM_BAND: usize = 16;

/// Highest band level; 0 means "below the noise floor".
pub const MAX_LEVEL: u8 = 16;

pub const FFT_SIZE: usize = 1024;

/// Number of bins produced by a real FFT of `FFT_SIZE` samples, Nyquist included.
pub const SPECTRUM_LEN: usize = FFT_SIZE / 2 + 1;

/// One level per band, `0..=MAX_LEVEL`.
pub type BandLevels = [u8; NUM_BAND];

/// Bin energies for one analysis cycle.
pub type Spectrum = [f32; SPECTRUM_LEN];
