use crate::config::AgcConfig;

/// Attack/release reference scale in dB above the noise floor.
///
/// A louder cycle lifts the scale instantly; a quieter one lets it fall by a
/// fixed step per cycle, never below this cycle's target nor below the floor.
#[derive(Clone, Debug, PartialEq)]
pub struct Agc {
    scale_db: f32,
    min_db: f32,
    decay_db: f32,
    headroom_db: f32,
}

impl Agc {
    pub fn new(config: &AgcConfig) -> Self {
        Self {
            scale_db: config.initial_scale_db.max(config.scale_min_db),
            min_db: config.scale_min_db,
            decay_db: config.scale_decay_db,
            headroom_db: config.headroom_db,
        }
    }

    /// Feeds the loudest noise-adjusted band of this cycle and returns the
    /// new scale.
    pub fn update(&mut self, peak_adj_db: f32) -> f32 {
        let target = peak_adj_db + self.headroom_db;

        if target > self.scale_db {
            self.scale_db = target;
        } else {
            self.scale_db -= self.decay_db;
            if self.scale_db < target {
                self.scale_db = target;
            }
            if self.scale_db < self.min_db {
                self.scale_db = self.min_db;
            }
        }
        self.scale_db
    }

    pub fn scale_db(&self) -> f32 {
        self.scale_db
    }

    pub fn min_db(&self) -> f32 {
        self.min_db
    }
}
