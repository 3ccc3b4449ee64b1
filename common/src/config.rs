use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::exchange::ExchangePolicy;
use crate::{ConfigError, NUM_BAND, SPECTRUM_LEN};

/// Largest matrix the pixel map can address with 16-bit indices.
pub const MAX_PIXELS: usize = u16::MAX as usize + 1;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CaptureConfig {
    /// ADC / I2S input channel handed to the capture driver
    pub channel: u8,
    pub sample_rate_hz: u32,
    pub use_hann_window: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BandConfig {
    /// first spectrum bin of band 0; 1 skips DC
    pub start_bin: usize,
    /// number of bins in each band
    pub widths: [u16; NUM_BAND],
    /// measured ambient noise per band, stored as |noise dBFS|
    pub noise_threshold_db: [f32; NUM_BAND],
    /// fixed boost (positive) or cut (negative) applied after noise subtraction
    pub gain_db: [f32; NUM_BAND],
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AgcConfig {
    pub initial_scale_db: f32,
    /// the scale never drops below this, which also keeps the divisor positive
    pub scale_min_db: f32,
    /// release step per analysis cycle
    pub scale_decay_db: f32,
    /// kept above the loudest band so level 16 is not pinned all the time
    pub headroom_db: f32,
    pub gamma: f32,
    /// power of a full-scale sine, the 0 dBFS reference
    pub full_scale_rms2: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MatrixConfig {
    pub rows: usize,
    pub cols: usize,
    /// peaks fall by one level every this many frames
    pub peak_decay_frames: u8,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeMode {
    /// Producer aggregates and publishes a copy of the band levels.
    CopyLevels(ExchangePolicy),
    /// Producer lends its single spectrum buffer; the consumer aggregates.
    SpectrumHandoff,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub config_version: u32,
    pub capture: CaptureConfig,
    pub bands: BandConfig,
    pub agc: AgcConfig,
    pub matrix: MatrixConfig,
    pub exchange: ExchangeMode,
    /// averaging window of the noise calibrator, 0 disables it
    pub calibration_frames: u32,
}

pub const CONFIG_VERSION: u32 = 1;

impl AppConfig {
    /// Serialize config to binary data using postcard
    pub fn to_bytes<const B: usize>(&self) -> postcard::Result<heapless::Vec<u8, B>> {
        postcard::to_vec::<_, B>(self)
    }

    /// Deserialize config from binary data using postcard
    pub fn from_bytes(data: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(data)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Checks everything that must hold before the pipeline may start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.sample_rate_hz == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        self.matrix.validate()?;
        if self.matrix.cols != NUM_BAND {
            return Err(ConfigError::ColumnMismatch {
                cols: self.matrix.cols,
                bands: NUM_BAND,
            });
        }
        self.bands.validate(SPECTRUM_LEN)?;
        self.agc.validate()
    }
}

impl MatrixConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::EmptyMatrix {
                rows: self.rows,
                cols: self.cols,
            });
        }
        let pixels = self.rows.saturating_mul(self.cols);
        if pixels > MAX_PIXELS {
            return Err(ConfigError::MatrixTooLarge {
                pixels,
                max: MAX_PIXELS,
            });
        }
        if self.peak_decay_frames == 0 {
            return Err(ConfigError::ZeroPeakDecay);
        }
        Ok(())
    }
}

impl BandConfig {
    /// One past the last bin read by the last band.
    pub fn end_bin(&self) -> usize {
        self.start_bin + self.widths.iter().map(|&w| w as usize).sum::<usize>()
    }

    pub fn validate(&self, spectrum_len: usize) -> Result<(), ConfigError> {
        if let Some(band) = self.widths.iter().position(|&w| w == 0) {
            return Err(ConfigError::ZeroWidthBand { band });
        }
        let end = self.end_bin();
        if end > spectrum_len {
            return Err(ConfigError::BandsExceedSpectrum {
                end,
                len: spectrum_len,
            });
        }
        Ok(())
    }
}

impl AgcConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, f32, bool); 6] = [
            ("scale_min_db", self.scale_min_db, self.scale_min_db > 0.0),
            ("scale_decay_db", self.scale_decay_db, self.scale_decay_db >= 0.0),
            ("headroom_db", self.headroom_db, self.headroom_db >= 0.0),
            ("gamma", self.gamma, self.gamma > 0.0),
            ("full_scale_rms2", self.full_scale_rms2, self.full_scale_rms2 > 0.0),
            ("initial_scale_db", self.initial_scale_db, true),
        ];
        for (name, value, ok) in checks {
            // NaN fails every comparison above, infinities are caught here
            if !ok || !value.is_finite() {
                return Err(ConfigError::InvalidAgc { name, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(AppConfig::default().validate(), Ok(()));
        assert_eq!(AppConfig::lossless().validate(), Ok(()));
        assert_eq!(AppConfig::handoff().validate(), Ok(()));
    }

    #[test]
    fn rejects_band_table_beyond_spectrum() {
        let mut config = AppConfig::default();
        config.bands.widths[15] = 400;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BandsExceedSpectrum { len: SPECTRUM_LEN, .. })
        ));
    }

    #[test]
    fn rejects_zero_width_band() {
        let mut config = AppConfig::default();
        config.bands.widths[3] = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroWidthBand { band: 3 }));
    }

    #[test]
    fn rejects_bad_geometry() {
        let mut config = AppConfig::default();
        config.matrix.rows = 0;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyMatrix { .. })));

        let mut config = AppConfig::default();
        config.matrix.cols = 8;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ColumnMismatch { cols: 8, bands: NUM_BAND })
        );

        let mut config = AppConfig::default();
        config.matrix.peak_decay_frames = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroPeakDecay));
    }

    #[test]
    fn rejects_degenerate_agc() {
        let mut config = AppConfig::default();
        config.agc.scale_min_db = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAgc { name: "scale_min_db", .. })
        ));

        let mut config = AppConfig::default();
        config.agc.gamma = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAgc { name: "gamma", .. })
        ));
    }

    #[test]
    fn postcard_and_json_keep_the_config() {
        let config = AppConfig::lossless();
        let bytes = config.to_bytes::<512>().unwrap();
        assert_eq!(AppConfig::from_bytes(&bytes).unwrap(), config);

        let json = config.to_json().unwrap();
        assert_eq!(AppConfig::from_json(&json).unwrap(), config);
    }
}
