use crate::dsp::Stage;
use crate::dsp::biquad::Biquad;
use crate::params::{
    BASS_SHELF_HZ, GAIN_MAX_DB, GAIN_MIN_DB, PRESENCE_HZ, PRESENCE_Q, ToneShapeState, clamp_param,
};

/// Bass low-shelf followed by a presence peak.
///
/// Neither filter ever leaves the chain. Disabling the shelf parks it at
/// 0 dB so toggling cannot click; the requested gain is remembered for when
/// it is switched back on.
pub struct ToneShaping {
    bass_shelf: Biquad,
    presence: Biquad,
    bass_enabled: bool,
    bass_gain_db: f32,
}

impl ToneShaping {
    pub fn new(state: &ToneShapeState, sample_rate: f32) -> Self {
        let mut tone = Self {
            bass_shelf: Biquad::low_shelf(BASS_SHELF_HZ, 0.0, sample_rate),
            presence: Biquad::peaking(PRESENCE_HZ, PRESENCE_Q, 0.0, sample_rate),
            bass_enabled: false,
            bass_gain_db: 0.0,
        };
        tone.set_bass_shelf(state.bass_enabled, state.bass_gain_db);
        tone.set_presence(state.presence_gain_db);
        tone
    }

    pub fn set_bass_shelf(&mut self, enabled: bool, gain_db: f32) {
        self.bass_enabled = enabled;
        if let Some(db) = clamp_param(gain_db, GAIN_MIN_DB, GAIN_MAX_DB) {
            self.bass_gain_db = db;
        }
        let effective = if enabled { self.bass_gain_db } else { 0.0 };
        self.bass_shelf.set_gain_db(effective);
    }

    pub fn set_presence(&mut self, gain_db: f32) {
        if let Some(db) = clamp_param(gain_db, GAIN_MIN_DB, GAIN_MAX_DB) {
            self.presence.set_gain_db(db);
        }
    }

    pub fn state(&self) -> ToneShapeState {
        ToneShapeState {
            bass_enabled: self.bass_enabled,
            bass_gain_db: self.bass_gain_db,
            presence_gain_db: self.presence.gain_db(),
        }
    }

    /// Gain currently programmed into the shelf filter.
    pub const fn effective_bass_gain_db(&self) -> f32 {
        self.bass_shelf.gain_db()
    }

    pub fn magnitude_db(&self, freq: f32) -> f32 {
        self.bass_shelf.magnitude_db(freq) + self.presence.magnitude_db(freq)
    }
}

impl Stage for ToneShaping {
    #[inline]
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let l = self.presence.process(0, self.bass_shelf.process(0, left));
        let r = self.presence.process(1, self.bass_shelf.process(1, right));
        (l, r)
    }

    fn reset(&mut self) {
        self.bass_shelf.reset();
        self.presence.reset();
    }
}
