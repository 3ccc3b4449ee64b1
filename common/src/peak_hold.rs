use alloc::vec;
use alloc::vec::Vec;

use crate::MAX_LEVEL;

/// Per-band decaying maximum of the band levels.
///
/// Every `decay_every`-th update lowers each held peak by one before the new
/// levels are merged in, so a marker jumps up with the bar and falls back
/// slowly on its own cadence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeakHold {
    peaks: Vec<u8>,
    max_level: u8,
    decay_every: u8,
    counter: u8,
}

impl PeakHold {
    /// `decay_every` of 0 is treated as 1 (decay on every update).
    pub fn new(cols: usize, decay_every: u8) -> Self {
        Self {
            peaks: vec![0; cols],
            max_level: MAX_LEVEL,
            decay_every: decay_every.max(1),
            counter: 0,
        }
    }

    /// Levels above `max_level` are held as `max_level`.
    pub fn with_max_level(mut self, max_level: u8) -> Self {
        self.max_level = max_level;
        self
    }

    /// Merges one frame of levels and returns the held peaks.
    ///
    /// Missing levels count as zero, extra ones are ignored.
    pub fn update(&mut self, levels: &[u8]) -> &[u8] {
        self.counter = (self.counter + 1) % self.decay_every;
        if self.counter == 0 {
            for peak in self.peaks.iter_mut() {
                *peak = peak.saturating_sub(1);
            }
        }

        for (peak, &level) in self.peaks.iter_mut().zip(levels) {
            let level = level.min(self.max_level);
            if level > *peak {
                *peak = level;
            }
        }
        &self.peaks
    }

    pub fn peaks(&self) -> &[u8] {
        &self.peaks
    }

    pub fn reset(&mut self) {
        self.peaks.fill(0);
        self.counter = 0;
    }
}
