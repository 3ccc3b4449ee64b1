//! The pipeline split into the pieces each core owns.
//!
//! In the copy variant the producer runs [`SpectrumStage`] and [`LevelStage`]
//! and ships band levels; in the handoff variant it only runs
//! [`SpectrumStage`] and the consumer runs [`LevelStage`] itself. The consumer
//! always owns [`DisplayStage`].

use smart_leds::RGB8;

use crate::aggregator::BandAggregator;
use crate::calibration::{NoiseCalibrator, preview_levels};
use crate::config::{AppConfig, MatrixConfig};
use crate::io::{LedTransmitter, MonotonicClock, SpectrumAnalyzer};
use crate::palette::{self, ColorOrder, RowPalette};
use crate::peak_hold::PeakHold;
use crate::pixel_map::PixelMap;
use crate::render::{MatrixRenderer, RenderTiming};
use crate::{BandLevels, ConfigError, MAX_LEVEL, NUM_BAND, SPECTRUM_LEN};

pub struct SpectrumStage<A> {
    analyzer: A,
    windowed: bool,
}

impl<A: SpectrumAnalyzer> SpectrumStage<A> {
    pub fn new(analyzer: A, config: &AppConfig) -> Self {
        Self {
            analyzer,
            windowed: config.capture.use_hann_window,
        }
    }

    pub fn transform(&mut self, samples: &[i16], out: &mut [f32]) {
        self.analyzer.transform(samples, self.windowed, out);
    }
}

/// Spectrum to band levels, with optional noise calibration.
///
/// While calibrating, the AGC is bypassed and a coarse fixed-scale preview is
/// shown instead so the display still reacts.
pub struct LevelStage {
    aggregator: BandAggregator,
    calibrator: Option<NoiseCalibrator>,
    band_dbfs: [f32; NUM_BAND],
}

impl LevelStage {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let aggregator = BandAggregator::new(&config.bands, &config.agc, SPECTRUM_LEN)?;
        let calibrator = match config.calibration_frames {
            0 => None,
            frames => {
                log::info!("noise calibration enabled, {} frame window", frames);
                Some(NoiseCalibrator::new(frames))
            }
        };

        Ok(Self {
            aggregator,
            calibrator,
            band_dbfs: [0.0; NUM_BAND],
        })
    }

    pub fn process(&mut self, spectrum: &[f32], out: &mut BandLevels) {
        match self.calibrator.as_mut() {
            None => self.aggregator.aggregate(spectrum, out),
            Some(calibrator) => {
                self.aggregator.band_dbfs_into(spectrum, &mut self.band_dbfs);
                calibrator.push(&self.band_dbfs);
                preview_levels(&self.band_dbfs, out);
            }
        }
    }

    pub fn aggregator(&self) -> &BandAggregator {
        &self.aggregator
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrator.is_some()
    }
}

/// Peak hold plus rendering, the consumer's per-frame work.
pub struct DisplayStage {
    peaks: PeakHold,
    renderer: MatrixRenderer,
}

impl DisplayStage {
    /// Default palette and peak color, GRB byte order.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let palette = RowPalette::spectrum(config.matrix.rows);
        Self::new(&config.matrix, &palette, palette::PEAK, ColorOrder::Grb)
    }

    pub fn new(
        matrix: &MatrixConfig,
        palette: &RowPalette,
        peak: RGB8,
        order: ColorOrder,
    ) -> Result<Self, ConfigError> {
        matrix.validate()?;
        let map = PixelMap::new(matrix.rows, matrix.cols)?;
        let renderer = MatrixRenderer::new(&map, palette, peak, order)?;

        Ok(Self {
            peaks: PeakHold::new(matrix.cols, matrix.peak_decay_frames)
                .with_max_level(matrix.rows.min(MAX_LEVEL as usize) as u8),
            renderer,
        })
    }

    /// Tracks peaks and sends one frame. Peaks are tracked even while hidden.
    pub fn show<T: LedTransmitter>(
        &mut self,
        levels: &[u8],
        show_peaks: bool,
        tx: &mut T,
    ) -> Result<(), T::Error> {
        let peaks = self.peaks.update(levels);
        self.renderer.render(levels, Some(peaks), show_peaks, tx)
    }

    pub fn show_timed<T: LedTransmitter, C: MonotonicClock>(
        &mut self,
        levels: &[u8],
        show_peaks: bool,
        tx: &mut T,
        clock: &C,
    ) -> Result<RenderTiming, T::Error> {
        let peaks = self.peaks.update(levels);
        self.renderer
            .render_timed(levels, Some(peaks), show_peaks, tx, clock)
    }

    pub fn clear<T: LedTransmitter>(&mut self, tx: &mut T) -> Result<(), T::Error> {
        self.peaks.reset();
        self.renderer.clear(tx)
    }

    pub fn peaks(&self) -> &[u8] {
        self.peaks.peaks()
    }

    pub fn buffer(&self) -> &[u8] {
        self.renderer.buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExchangeMode;
    use crate::fft::RealFft;
    use core::convert::Infallible;

    struct Sink(usize);

    impl LedTransmitter for Sink {
        type Error = Infallible;

        fn transmit(&mut self, _: &[u8]) -> Result<(), Infallible> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn silence_runs_through_every_stage() {
        let config = AppConfig::default();
        let mut spectrum_stage = SpectrumStage::new(RealFft::new(), &config);
        let mut level_stage = LevelStage::from_config(&config).unwrap();
        let mut display = DisplayStage::from_config(&config).unwrap();

        let mut spectrum = [0.0f32; SPECTRUM_LEN];
        let mut levels = [0u8; NUM_BAND];
        let mut sink = Sink(0);
        spectrum_stage.transform(&[0; 1024], &mut spectrum);
        level_stage.process(&spectrum, &mut levels);
        display.show(&levels, true, &mut sink).unwrap();

        assert_eq!(levels, [0; NUM_BAND]);
        assert!(display.buffer().iter().all(|&b| b == 0));
        assert_eq!(sink.0, 1);
    }

    #[test]
    fn calibration_shows_preview() {
        let config = AppConfig {
            calibration_frames: 2,
            ..AppConfig::default()
        };
        let mut level_stage = LevelStage::from_config(&config).unwrap();
        assert!(level_stage.is_calibrating());

        let mut levels = [0u8; NUM_BAND];
        level_stage.process(&[0.0; SPECTRUM_LEN], &mut levels);
        assert_eq!(levels, [1; NUM_BAND]);
        // the AGC is left alone
        assert_eq!(level_stage.aggregator().scale_db(), 20.0);
    }

    #[test]
    fn peaks_are_tracked_while_hidden() {
        let config = AppConfig {
            exchange: ExchangeMode::SpectrumHandoff,
            ..AppConfig::default()
        };
        let mut display = DisplayStage::from_config(&config).unwrap();
        let mut sink = Sink(0);
        display.show(&[9; NUM_BAND], false, &mut sink).unwrap();
        display.show(&[0; NUM_BAND], false, &mut sink).unwrap();
        assert_eq!(display.peaks(), &[8; NUM_BAND]);

        display.clear(&mut sink).unwrap();
        assert_eq!(display.peaks(), &[0; NUM_BAND]);
        assert_eq!(sink.0, 3);
    }

    #[test]
    fn overflowing_levels_render_like_full_bars() {
        let config = AppConfig::default();
        let mut over = DisplayStage::from_config(&config).unwrap();
        let mut full = DisplayStage::from_config(&config).unwrap();
        let mut sink = Sink(0);

        over.show(&[20; NUM_BAND], true, &mut sink).unwrap();
        full.show(&[16; NUM_BAND], true, &mut sink).unwrap();
        assert_eq!(over.peaks(), &[16; NUM_BAND]);
        assert_eq!(over.buffer(), full.buffer());

        for _ in 0..4 {
            over.show(&[0; NUM_BAND], true, &mut sink).unwrap();
            full.show(&[0; NUM_BAND], true, &mut sink).unwrap();
            assert_eq!(over.peaks(), full.peaks());
            assert_eq!(over.buffer(), full.buffer());
        }
    }

    #[test]
    fn invalid_config_is_refused() {
        let mut config = AppConfig::default();
        config.matrix.cols = 4;
        assert!(DisplayStage::from_config(&config).is_err());
        assert!(LevelStage::from_config(&config).is_err());
    }
}
