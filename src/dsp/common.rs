/// Convert decibels to linear amplitude.
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels. Silence maps to -100 dB.
#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    if lin > 1e-10 {
        20.0 * lin.log10()
    } else {
        -100.0
    }
}

/// Calculate a one-pole smoothing coefficient from a time constant in milliseconds.
///
/// Returns `exp(-1 / (sample_rate * time_ms * 0.001))`.
/// Used for attack/release envelopes and parameter ramps. A zero time
/// constant yields 0.0, i.e. an instant jump.
#[inline]
pub fn calculate_coefficient(time_ms: f32, sample_rate: f32) -> f32 {
    if time_ms <= 0.0 {
        return 0.0;
    }
    (-1.0 / (sample_rate * 0.001 * time_ms)).exp()
}

/// One-pole envelope follower with configurable attack and release coefficients.
#[derive(Clone)]
pub struct EnvelopeFollower {
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl EnvelopeFollower {
    /// Create from pre-computed coefficients.
    pub const fn new(attack_coeff: f32, release_coeff: f32) -> Self {
        Self {
            envelope: 0.0,
            attack_coeff,
            release_coeff,
        }
    }

    /// Create from attack/release times in milliseconds.
    pub fn from_ms(attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self::new(
            calculate_coefficient(attack_ms, sample_rate),
            calculate_coefficient(release_ms, sample_rate),
        )
    }

    pub const fn set_attack_coeff(&mut self, coeff: f32) {
        self.attack_coeff = coeff;
    }

    pub const fn set_release_coeff(&mut self, coeff: f32) {
        self.release_coeff = coeff;
    }

    pub const fn value(&self) -> f32 {
        self.envelope
    }

    pub const fn reset(&mut self) {
        self.envelope = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let abs_input = input.abs();
        if abs_input > self.envelope {
            self.envelope = self
                .attack_coeff
                .mul_add(self.envelope, (1.0 - self.attack_coeff) * abs_input);
        } else {
            self.envelope = self
                .release_coeff
                .mul_add(self.envelope, (1.0 - self.release_coeff) * abs_input);
        }
        self.envelope
    }
}

/// One-pole ramp towards a target value.
///
/// The target is only changed between blocks; the ramp itself runs per sample
/// so abrupt gain changes never step.
#[derive(Clone, Debug)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    coeff: f32,
}

impl SmoothedValue {
    const SETTLE_EPSILON: f32 = 1e-6;

    pub fn new(value: f32, smoothing_ms: f32, sample_rate: f32) -> Self {
        Self {
            current: value,
            target: value,
            coeff: calculate_coefficient(smoothing_ms, sample_rate),
        }
    }

    pub const fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jump straight to `value`, skipping the ramp.
    pub const fn snap(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    pub const fn target(&self) -> f32 {
        self.target
    }

    pub const fn current(&self) -> f32 {
        self.current
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.current != self.target {
            self.current = self.coeff.mul_add(self.current - self.target, self.target);
            if (self.current - self.target).abs() < Self::SETTLE_EPSILON {
                self.current = self.target;
            }
        }
        self.current
    }
}
