use crate::dsp::Stage;
use crate::dsp::common::{EnvelopeFollower, calculate_coefficient, db_to_lin, lin_to_db};
use crate::params::{COMPRESSOR_KNEE_DB, DynamicsParams};

/// Feed-forward compressor with a stereo-linked detector and a fixed
/// quadratic soft knee of `COMPRESSOR_KNEE_DB` centred on the threshold.
///
/// Whether the stage is in the signal path at all is decided by the graph
/// topology; this type only holds the settings and the detector state.
pub struct DynamicsStage {
    threshold_db: f32,
    ratio: f32,
    attack_secs: f32,
    release_secs: f32,
    envelope: EnvelopeFollower,
    sample_rate: f32,
}

impl DynamicsStage {
    pub fn new(params: &DynamicsParams, sample_rate: f32) -> Self {
        let params = params.clamped(&DynamicsParams::default());
        Self {
            threshold_db: params.threshold_db,
            ratio: params.ratio,
            attack_secs: params.attack_secs,
            release_secs: params.release_secs,
            envelope: EnvelopeFollower::from_ms(
                params.attack_secs * 1000.0,
                params.release_secs * 1000.0,
                sample_rate,
            ),
            sample_rate,
        }
    }

    /// Apply threshold/ratio/attack/release. `enabled` is ignored here.
    pub fn set_params(&mut self, params: &DynamicsParams) {
        let current = self.params(true);
        let params = params.clamped(&current);

        self.threshold_db = params.threshold_db;
        self.ratio = params.ratio;

        if params.attack_secs != self.attack_secs {
            self.attack_secs = params.attack_secs;
            self.envelope
                .set_attack_coeff(calculate_coefficient(self.attack_secs * 1000.0, self.sample_rate));
        }
        if params.release_secs != self.release_secs {
            self.release_secs = params.release_secs;
            self.envelope.set_release_coeff(calculate_coefficient(
                self.release_secs * 1000.0,
                self.sample_rate,
            ));
        }
    }

    pub const fn params(&self, enabled: bool) -> DynamicsParams {
        DynamicsParams {
            enabled,
            threshold_db: self.threshold_db,
            ratio: self.ratio,
            attack_secs: self.attack_secs,
            release_secs: self.release_secs,
        }
    }

    /// Current gain reduction in dB (<= 0).
    pub fn gain_reduction_db(&self) -> f32 {
        self.curve_db(lin_to_db(self.envelope.value()))
    }

    #[inline]
    fn gain_for(&self, env: f32) -> f32 {
        db_to_lin(self.curve_db(lin_to_db(env)))
    }

    /// Static curve: gain change in dB for a detector level in dB.
    fn curve_db(&self, level_db: f32) -> f32 {
        let overshoot = level_db - self.threshold_db;
        let slope = 1.0 / self.ratio - 1.0;
        if 2.0 * overshoot <= -COMPRESSOR_KNEE_DB {
            0.0
        } else if 2.0 * overshoot < COMPRESSOR_KNEE_DB {
            let x = overshoot + COMPRESSOR_KNEE_DB / 2.0;
            slope * x * x / (2.0 * COMPRESSOR_KNEE_DB)
        } else {
            slope * overshoot
        }
    }
}

impl Stage for DynamicsStage {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        // Linked detector (avoid log(0) downstream)
        let level_in = left.abs().max(right.abs()).max(1e-10);
        let env = self.envelope.process(level_in);
        let gain = self.gain_for(env);
        (left * gain, right * gain)
    }

    fn reset(&mut self) {
        self.envelope.reset();
    }
}
