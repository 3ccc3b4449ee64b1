use core::ops::Range;

use crate::agc::Agc;
use crate::bands::BandLayout;
use crate::config::{AgcConfig, BandConfig};
use crate::{BandLevels, ConfigError, MAX_LEVEL, NUM_BAND};

/// Level reported for a band without any energy.
pub const SILENCE_DBFS: f32 = -120.0;

/// Loudness of the bins in `bins`, in dB relative to a full-scale sine.
///
/// Bins past the end of `spectrum` count as zero.
pub fn band_dbfs(spectrum: &[f32], bins: Range<usize>, full_scale_rms2: f32) -> f32 {
    let end = bins.end.min(spectrum.len());
    let start = bins.start.min(end);
    let energy: f32 = spectrum[start..end].iter().sum();

    // also catches NaN from a misbehaving transform
    if !(energy > 0.0) {
        return SILENCE_DBFS;
    }
    10.0 * libm::log10f(2.0 * energy / full_scale_rms2)
}

/// Turns a bin-energy spectrum into one display level per band.
///
/// Per cycle: band energy to dBFS, noise floor subtraction, AGC scale update,
/// then fixed gain, normalisation, gamma and quantisation to `0..=16`.
pub struct BandAggregator {
    layout: BandLayout,
    noise_threshold_db: [f32; NUM_BAND],
    gain_db: [f32; NUM_BAND],
    gamma: f32,
    full_scale_rms2: f32,
    agc: Agc,
    adj: [f32; NUM_BAND],
}

impl BandAggregator {
    pub fn new(
        bands: &BandConfig,
        agc: &AgcConfig,
        spectrum_len: usize,
    ) -> Result<Self, ConfigError> {
        agc.validate()?;
        let layout = BandLayout::new(bands.start_bin, &bands.widths, spectrum_len)?;
        log::debug!(
            "band aggregator: bins {}..{}, scale {} dB",
            layout.edges()[0],
            layout.edges()[NUM_BAND],
            agc.initial_scale_db
        );

        Ok(Self {
            layout,
            noise_threshold_db: bands.noise_threshold_db,
            gain_db: bands.gain_db,
            gamma: agc.gamma,
            full_scale_rms2: agc.full_scale_rms2,
            agc: Agc::new(agc),
            adj: [0.0; NUM_BAND],
        })
    }

    pub fn aggregate(&mut self, spectrum: &[f32], out: &mut BandLevels) {
        let mut peak_adj = 0.0f32;
        for band in 0..NUM_BAND {
            let db = band_dbfs(spectrum, self.layout.range(band), self.full_scale_rms2);
            let adj = (db + self.noise_threshold_db[band]).max(0.0);
            self.adj[band] = adj;
            if adj > peak_adj {
                peak_adj = adj;
            }
        }

        // the AGC floor keeps this strictly positive
        let scale = self.agc.update(peak_adj);

        for (band, level) in out.iter_mut().enumerate() {
            *level = self.quantize(band, scale);
        }
    }

    fn quantize(&self, band: usize, scale: f32) -> u8 {
        let adj = self.adj[band];
        if adj <= 0.0 {
            return 0;
        }
        let adj_eff = (adj + self.gain_db[band]).max(0.0);
        let x = (adj_eff / scale).min(1.0);
        let y = libm::powf(x, self.gamma);

        let level = 1 + (y * 15.0 + 0.5) as u8;
        level.clamp(1, MAX_LEVEL)
    }

    /// Raw dBFS of every band, for noise calibration.
    pub fn band_dbfs_into(&self, spectrum: &[f32], out: &mut [f32; NUM_BAND]) {
        for (band, db) in out.iter_mut().enumerate() {
            *db = band_dbfs(spectrum, self.layout.range(band), self.full_scale_rms2);
        }
    }

    pub fn scale_db(&self) -> f32 {
        self.agc.scale_db()
    }

    /// Noise-adjusted dB values of the last cycle.
    pub fn adjusted_db(&self) -> &[f32; NUM_BAND] {
        &self.adj
    }

    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }
}
