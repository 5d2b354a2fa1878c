//! Plain parameter state shared by the controller and the audio side.
//!
//! Values stored here are always already clamped; the audio side re-clamps
//! anyway before touching the signal path.

use serde::{Deserialize, Serialize};


/// Lowest sample rate the chain accepts.
pub const MIN_SAMPLE_RATE: u32 = 8000;

pub const BAND_COUNT: usize = 10;
pub const EQ_FREQUENCIES: [f32; BAND_COUNT] = [
    32.0, 64.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];
pub const EQ_Q: f32 = 1.0;
pub const EQ_GAIN_MIN_DB: f32 = -12.0;
pub const EQ_GAIN_MAX_DB: f32 = 12.0;

/// Range shared by pre-amp, trim, bass shelf and presence.
pub const GAIN_MIN_DB: f32 = -24.0;
pub const GAIN_MAX_DB: f32 = 24.0;

pub const BASS_SHELF_HZ: f32 = 100.0;
pub const PRESENCE_HZ: f32 = 4000.0;
pub const PRESENCE_Q: f32 = 1.0;

pub const THRESHOLD_MIN_DB: f32 = -100.0;
pub const THRESHOLD_MAX_DB: f32 = 0.0;
pub const RATIO_MIN: f32 = 1.0;
pub const RATIO_MAX: f32 = 20.0;
pub const ATTACK_MIN_SECS: f32 = 0.0001;
pub const ATTACK_MAX_SECS: f32 = 1.0;
pub const RELEASE_MIN_SECS: f32 = 0.001;
pub const RELEASE_MAX_SECS: f32 = 1.0;
/// Width of the compressor's soft knee.
pub const COMPRESSOR_KNEE_DB: f32 = 30.0;

pub const DECAY_MIN_SECS: f32 = 0.05;
pub const DECAY_MAX_SECS: f32 = 10.0;

/// Clamp a controller value into `min..=max`. `NaN` has no meaningful
/// position in the range and yields `None`.
pub fn clamp_param(value: f32, min: f32, max: f32) -> Option<f32> {
    if value.is_nan() {
        None
    } else {
        Some(value.clamp(min, max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneShapeState {
    pub bass_enabled: bool,
    pub bass_gain_db: f32,
    pub presence_gain_db: f32,
}

impl Default for ToneShapeState {
    fn default() -> Self {
        Self {
            bass_enabled: false,
            bass_gain_db: 6.0,
            presence_gain_db: 0.0,
        }
    }
}

impl ToneShapeState {
    /// Gain actually applied to the shelf filter: a disabled shelf stays in
    /// the chain at 0 dB.
    pub fn effective_bass_gain_db(&self) -> f32 {
        if self.bass_enabled {
            self.bass_gain_db
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicsParams {
    pub enabled: bool,
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_secs: f32,
    pub release_secs: f32,
}

impl Default for DynamicsParams {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_db: -24.0,
            ratio: 4.0,
            attack_secs: 0.003,
            release_secs: 0.25,
        }
    }
}

impl DynamicsParams {
    /// Clamp every field into range. `NaN` fields keep the value from `fallback`.
    pub fn clamped(self, fallback: &Self) -> Self {
        Self {
            enabled: self.enabled,
            threshold_db: clamp_param(self.threshold_db, THRESHOLD_MIN_DB, THRESHOLD_MAX_DB)
                .unwrap_or(fallback.threshold_db),
            ratio: clamp_param(self.ratio, RATIO_MIN, RATIO_MAX).unwrap_or(fallback.ratio),
            attack_secs: clamp_param(self.attack_secs, ATTACK_MIN_SECS, ATTACK_MAX_SECS)
                .unwrap_or(fallback.attack_secs),
            release_secs: clamp_param(self.release_secs, RELEASE_MIN_SECS, RELEASE_MAX_SECS)
                .unwrap_or(fallback.release_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbParams {
    pub enabled: bool,
    pub mix: f32,
    pub decay_secs: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            enabled: false,
            mix: 0.2,
            decay_secs: 2.5,
        }
    }
}

impl ReverbParams {
    /// Wet gain fed to the mixer. Dry is always 1.0.
    pub fn effective_wet(&self) -> f32 {
        if self.enabled { self.mix } else { 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BalanceState {
    pub pan: f32,
}

/// Every controller-visible parameter of the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterState {
    pub preamp_db: f32,
    pub trim_db: f32,
    pub eq_gains: [f32; BAND_COUNT],
    pub tone: ToneShapeState,
    pub dynamics: DynamicsParams,
    pub reverb: ReverbParams,
    pub balance: BalanceState,
    pub bypass: bool,
}

impl Default for ParameterState {
    fn default() -> Self {
        Self {
            preamp_db: 0.0,
            trim_db: 0.0,
            eq_gains: [0.0; BAND_COUNT],
            tone: ToneShapeState::default(),
            dynamics: DynamicsParams::default(),
            reverb: ReverbParams::default(),
            balance: BalanceState::default(),
            bypass: false,
        }
    }
}
