use crate::config::*;
use crate::exchange::ExchangePolicy;

/// 32767² / 2, a full-scale sine in i16 units
pub const FULL_SCALE_RMS2: f32 = 536_838_144.5;

// Noise thresholds below were measured with a MAX4466 electret amplifier at
// 44 kHz, using the noise calibrator.
const NOISE_LOG_18K: [f32; 16] = [
    48.0, 48.0, 51.0, 51.0, 52.0, 51.0, 51.0, 51.0, 51.0, 51.0, 51.0, 51.0, 54.0, 57.0, 62.0, 69.0,
];

impl BandConfig {
    /// Log-like split up to ~18 kHz.
    pub fn log_18k() -> Self {
        Self {
            start_bin: 1,
            widths: [1, 1, 1, 2, 2, 3, 5, 7, 9, 14, 19, 27, 39, 65, 95, 131],
            noise_threshold_db: NOISE_LOG_18K,
            gain_db: [0.0; 16],
        }
    }

    /// Up to ~16 kHz with more resolution in the lows and mids.
    pub fn detailed_16k() -> Self {
        Self {
            start_bin: 1,
            widths: [1, 1, 1, 2, 3, 4, 5, 7, 10, 14, 21, 28, 42, 58, 81, 93],
            noise_threshold_db: [
                43.0, 44.0, 48.0, 49.0, 51.0, 53.0, 55.0, 56.0, 56.0, 57.0, 57.0, 57.0, 53.0, 60.0,
                63.0, 71.0,
            ],
            gain_db: [0.0; 16],
        }
    }

    /// Up to ~16 kHz, closer to a pure logarithmic split.
    pub fn log_16k() -> Self {
        Self {
            start_bin: 1,
            widths: [1, 1, 1, 1, 1, 3, 4, 6, 9, 12, 19, 26, 38, 55, 79, 115],
            noise_threshold_db: [
                51.0, 51.0, 53.0, 55.0, 56.0, 52.0, 52.0, 51.0, 50.0, 49.0, 49.0, 49.0, 47.0, 54.0,
                56.0, 63.0,
            ],
            gain_db: [0.0; 16],
        }
    }

    /// The whole band up to Nyquist (bin 512 itself is left out).
    pub fn full_22k() -> Self {
        Self {
            start_bin: 1,
            widths: [1, 1, 1, 2, 3, 4, 5, 7, 10, 14, 21, 30, 44, 63, 91, 214],
            noise_threshold_db: NOISE_LOG_18K,
            gain_db: [0.0; 16],
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            sample_rate_hz: 44_000,
            use_hann_window: true,
        }
    }
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            initial_scale_db: 20.0,
            scale_min_db: 6.0,
            scale_decay_db: 0.10,
            headroom_db: 0.4,
            gamma: 1.8,
            full_scale_rms2: FULL_SCALE_RMS2,
        }
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            rows: 16,
            cols: 16,
            peak_decay_frames: 2,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            capture: CaptureConfig::default(),
            bands: BandConfig::log_18k(),
            agc: AgcConfig::default(),
            matrix: MatrixConfig::default(),
            exchange: ExchangeMode::CopyLevels(ExchangePolicy::DropFrames),
            calibration_frames: 0,
        }
    }
}

impl AppConfig {
    /// Every analysed frame is rendered; capture is throttled to the display.
    pub fn lossless() -> Self {
        Self {
            exchange: ExchangeMode::CopyLevels(ExchangePolicy::Block),
            ..Self::default()
        }
    }

    /// The render core aggregates straight from the capture core's spectrum.
    pub fn handoff() -> Self {
        Self {
            exchange: ExchangeMode::SpectrumHandoff,
            ..Self::default()
        }
    }

    /// Default pipeline with the noise calibrator reporting every 1000 frames.
    pub fn calibration() -> Self {
        Self {
            calibration_frames: 1000,
            ..Self::default()
        }
    }
}
