use thiserror::Error;

/// Reasons the pipeline refuses to start.
///
/// Only constructors and [`crate::config::AppConfig::validate`] return these;
/// per-frame operations clamp their inputs instead of failing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("matrix must have at least one row and one column (got {rows}x{cols})")]
    EmptyMatrix { rows: usize, cols: usize },

    #[error("matrix of {pixels} pixels exceeds the addressable maximum of {max}")]
    MatrixTooLarge { pixels: usize, max: usize },

    #[error("matrix has {cols} columns but the pipeline produces {bands} bands")]
    ColumnMismatch { cols: usize, bands: usize },

    #[error("palette has {colors} row colors for a matrix of {rows} rows")]
    PaletteMismatch { colors: usize, rows: usize },

    #[error("band {band} has zero width")]
    ZeroWidthBand { band: usize },

    #[error("bands end at bin {end} but the spectrum only has {len} bins")]
    BandsExceedSpectrum { end: usize, len: usize },

    #[error("invalid frequency range {fmin} Hz .. {fmax} Hz")]
    InvalidFrequencyRange { fmin: f64, fmax: f64 },

    #[error("ran out of FFT bins: band edge {bin} is beyond bin {limit}")]
    OutOfBins { bin: usize, limit: usize },

    #[error("invalid AGC setting `{name}` = {value}")]
    InvalidAgc { name: &'static str, value: f32 },

    #[error("peak decay cadence must be at least one frame")]
    ZeroPeakDecay,

    #[error("sample rate must be non-zero")]
    ZeroSampleRate,
}
