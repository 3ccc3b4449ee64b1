use core::ops::Range;

use crate::{ConfigError, NUM_BAND};

/// Bin edges of the band table: band `i` covers bins `edges[i]..edges[i + 1]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BandLayout {
    edges: [usize; NUM_BAND + 1],
}

impl BandLayout {
    pub fn new(
        start_bin: usize,
        widths: &[u16; NUM_BAND],
        spectrum_len: usize,
    ) -> Result<Self, ConfigError> {
        let mut edges = [0usize; NUM_BAND + 1];
        edges[0] = start_bin;
        for (band, &width) in widths.iter().enumerate() {
            if width == 0 {
                return Err(ConfigError::ZeroWidthBand { band });
            }
            edges[band + 1] = edges[band] + width as usize;
        }
        let end = edges[NUM_BAND];
        if end > spectrum_len {
            return Err(ConfigError::BandsExceedSpectrum {
                end,
                len: spectrum_len,
            });
        }
        Ok(Self { edges })
    }

    pub fn range(&self, band: usize) -> Range<usize> {
        self.edges[band]..self.edges[band + 1]
    }

    pub fn edges(&self) -> &[usize; NUM_BAND + 1] {
        &self.edges
    }

    /// Frequency span of each band in Hz, `(low, high)` with `high` exclusive.
    pub fn ranges_hz(&self, sample_rate_hz: u32, fft_size: usize) -> [(f32, f32); NUM_BAND] {
        let df = bin_width_hz(sample_rate_hz, fft_size);
        core::array::from_fn(|band| {
            (
                self.edges[band] as f32 * df,
                self.edges[band + 1] as f32 * df,
            )
        })
    }
}

pub fn bin_width_hz(sample_rate_hz: u32, fft_size: usize) -> f32 {
    sample_rate_hz as f32 / fft_size as f32
}

/// Splits `fmin..fmax` into `N` bands of equal width in octaves and returns
/// the width of each band in bins, starting at bin `k_start`.
///
/// Edges are rounded to the nearest bin and pushed up where needed so that
/// every band keeps at least one bin. `fmax` is clamped to Nyquist.
pub fn octave_widths<const N: usize>(
    sample_rate_hz: u32,
    fft_size: usize,
    fmin: f64,
    fmax: f64,
    k_start: usize,
    ignore_nyquist: bool,
) -> Result<[u16; N], ConfigError> {
    let df = sample_rate_hz as f64 / fft_size as f64;
    let fmax = fmax.min(sample_rate_hz as f64 / 2.0);

    if !(fmin > 0.0) || !(fmax > fmin) || N == 0 {
        return Err(ConfigError::InvalidFrequencyRange { fmin, fmax });
    }

    let step_oct = libm::log2(fmax / fmin) / N as f64;
    let ratio = libm::pow(2.0, step_oct);
    let limit = if ignore_nyquist {
        fft_size / 2 - 1
    } else {
        fft_size / 2
    };

    let mut widths = [0u16; N];
    let mut previous = k_start;
    for (i, width) in widths.iter_mut().enumerate() {
        let f = if i + 1 == N {
            fmax
        } else {
            fmin * libm::pow(ratio, (i + 1) as f64)
        };
        let mut k = libm::round(f / df) as usize;
        if k <= previous {
            k = previous + 1;
        }
        if k > limit {
            return Err(ConfigError::OutOfBins { bin: k, limit });
        }
        *width = (k - previous) as u16;
        previous = k;
    }
    Ok(widths)
}
