mod support;

use common::config::AppConfig;
use common::fft::RealFft;
use common::pipeline::{DisplayStage, LevelStage, SpectrumStage};
use common::pixel_map::PixelMap;
use common::{NUM_BAND, SPECTRUM_LEN};

use support::{HostClock, RecordingStrip, init_logger, sine_frame};

struct Pipeline {
    spectrum_stage: SpectrumStage<RealFft>,
    levels: LevelStage,
    display: DisplayStage,
    spectrum: [f32; SPECTRUM_LEN],
}

impl Pipeline {
    fn new(config: &AppConfig) -> Self {
        Self {
            spectrum_stage: SpectrumStage::new(RealFft::new(), config),
            levels: LevelStage::from_config(config).unwrap(),
            display: DisplayStage::from_config(config).unwrap(),
            spectrum: [0.0; SPECTRUM_LEN],
        }
    }

    fn cycle(&mut self, samples: &[i16], strip: &mut RecordingStrip) -> [u8; NUM_BAND] {
        let mut levels = [0u8; NUM_BAND];
        self.spectrum_stage.transform(samples, &mut self.spectrum);
        self.levels.process(&self.spectrum, &mut levels);
        self.display.show(&levels, true, strip).unwrap();
        levels
    }
}

#[test]
fn single_band_rises_and_its_peak_decays() {
    init_logger();
    let config = AppConfig::default();
    let mut pipeline = Pipeline::new(&config);
    let mut strip = RecordingStrip::default();

    // bin 9 sits in band 5 (bins 8..11); -20 dBFS
    let tone = sine_frame(9, 3276.7);
    for _ in 0..4 {
        let levels = pipeline.cycle(&tone, &mut strip);
        let mut expected = [0u8; NUM_BAND];
        expected[5] = 16;
        assert_eq!(levels, expected);
        assert_eq!(pipeline.display.peaks()[5], 16);
    }

    let silence = [0i16; 1024];
    let mut peaks = Vec::new();
    for _ in 0..8 {
        let levels = pipeline.cycle(&silence, &mut strip);
        assert_eq!(levels, [0; NUM_BAND]);
        peaks.push(pipeline.display.peaks()[5]);
    }
    assert_eq!(peaks, [16, 15, 15, 14, 14, 13, 13, 12]);
    assert!(pipeline.display.peaks().iter().enumerate().all(|(band, &p)| band == 5 || p == 0));
    assert_eq!(strip.frames.len(), 12);
}

#[test]
fn rendered_frames_show_bar_then_marker() {
    let config = AppConfig::default();
    let mut pipeline = Pipeline::new(&config);
    let map = PixelMap::new(config.matrix.rows, config.matrix.cols).unwrap();
    let mut strip = RecordingStrip::default();

    let lit = |frame: &[u8], row: usize, col: usize| {
        let offset = map.index(row, col) * 3;
        frame[offset..offset + 3] != [0, 0, 0]
    };

    pipeline.cycle(&sine_frame(9, 3276.7), &mut strip);
    let bar = &strip.frames[0];
    assert!((0..16).all(|row| lit(bar, row, 5)));
    assert!((0..16).all(|row| !lit(bar, row, 4) && !lit(bar, row, 6)));

    // the second update is a decay step: peak 15, marker one row below the top
    pipeline.cycle(&[0; 1024], &mut strip);
    let marker = &strip.frames[1];
    assert!(lit(marker, 1, 5));
    assert!(!lit(marker, 0, 5));
    assert!((2..16).all(|row| !lit(marker, row, 5)));
}

#[test]
fn timed_display_reports_consistent_durations() {
    let config = AppConfig::default();
    let mut display = DisplayStage::from_config(&config).unwrap();
    let mut strip = RecordingStrip::default();
    let clock = HostClock::new();

    let timing = display
        .show_timed(&[8; NUM_BAND], true, &mut strip, &clock)
        .unwrap();
    assert_eq!(timing.total_us, timing.fill_us + timing.transmit_us);
    assert_eq!(strip.frames.len(), 1);
}
