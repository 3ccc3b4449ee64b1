use crate::{BandLevels, MAX_LEVEL, NUM_BAND};

/// Averages the raw per-band dBFS over a fixed window to measure the ambient
/// noise floor. Negate the reported values to get `noise_threshold_db`.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseCalibrator {
    window: u32,
    frames: u32,
    sums: [f32; NUM_BAND],
}

impl NoiseCalibrator {
    /// A window of 0 is treated as 1.
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            frames: 0,
            sums: [0.0; NUM_BAND],
        }
    }

    /// Adds one frame; returns the rounded averages when the window is full
    /// and starts a new one.
    pub fn push(&mut self, band_dbfs: &[f32; NUM_BAND]) -> Option<[i16; NUM_BAND]> {
        for (sum, &db) in self.sums.iter_mut().zip(band_dbfs) {
            *sum += db;
        }
        self.frames += 1;
        if self.frames < self.window {
            return None;
        }

        let averages = self
            .sums
            .map(|sum| libm::roundf(sum / self.window as f32) as i16);
        log::info!("noise floor over {} frames: {:?}", self.window, averages);
        self.frames = 0;
        self.sums = [0.0; NUM_BAND];
        Some(averages)
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    /// Frames collected in the current window.
    pub fn pending(&self) -> u32 {
        self.frames
    }
}

/// Coarse fixed-scale level shown while calibrating: 3 dB per step,
/// -67 dBFS and below on the lowest row.
pub fn preview_level(db: f32) -> u8 {
    let step = (libm::roundf(db) as i32 + 70).div_euclid(3);
    step.clamp(1, MAX_LEVEL as i32) as u8
}

pub fn preview_levels(band_dbfs: &[f32; NUM_BAND], out: &mut BandLevels) {
    for (level, &db) in out.iter_mut().zip(band_dbfs) {
        *level = preview_level(db);
    }
}
