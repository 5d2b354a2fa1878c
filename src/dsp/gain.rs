use crate::dsp::Stage;
use crate::dsp::common::{SmoothedValue, db_to_lin};
use crate::params::{GAIN_MAX_DB, GAIN_MIN_DB, clamp_param};

/// Scalar gain in dB, used for pre-amp and output trim.
pub struct GainStage {
    gain_db: f32,
    gain: SmoothedValue,
}

impl GainStage {
    pub fn new(gain_db: f32, smoothing_ms: f32, sample_rate: f32) -> Self {
        let gain_db = clamp_param(gain_db, GAIN_MIN_DB, GAIN_MAX_DB).unwrap_or(0.0);
        Self {
            gain_db,
            gain: SmoothedValue::new(db_to_lin(gain_db), smoothing_ms, sample_rate),
        }
    }

    pub fn set_gain_db(&mut self, gain_db: f32) {
        if let Some(db) = clamp_param(gain_db, GAIN_MIN_DB, GAIN_MAX_DB) {
            self.gain_db = db;
            self.gain.set_target(db_to_lin(db));
        }
    }

    pub const fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Linear gain the stage is ramping towards.
    pub const fn target_gain(&self) -> f32 {
        self.gain.target()
    }
}

impl Stage for GainStage {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let g = self.gain.next_value();
        (left * g, right * g)
    }

    fn reset(&mut self) {
        self.gain.snap(self.gain.target());
    }
}
