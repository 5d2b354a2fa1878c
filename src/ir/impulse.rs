use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const CHANNELS: usize = 2;

// Level calibration used by the host convolver when it normalizes buffers
const GAIN_CALIBRATION: f32 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44_100.0;
const MIN_POWER: f32 = 0.000125;

/// Synthetic stereo impulse response: white noise under a cubic decay.
///
/// Built once per decay setting and never mutated afterwards; a new decay
/// time means a new `ImpulseResponse`.
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    channels: [Vec<f32>; CHANNELS],
    sample_rate: f32,
    decay_secs: f32,
}

/// Cubic decay weight for sample `index` of `len`.
#[inline]
pub fn envelope(index: usize, len: usize) -> f32 {
    let t = index as f32 / len as f32;
    (1.0 - t).powi(3)
}

/// Number of samples an impulse of `decay_secs` occupies. Never zero.
pub fn impulse_len(decay_secs: f32, sample_rate: f32) -> usize {
    ((decay_secs * sample_rate).round() as usize).max(1)
}

impl ImpulseResponse {
    /// Synthesize an impulse. `seed` makes the noise reproducible; `None`
    /// draws fresh entropy every time.
    pub fn synthesize(decay_secs: f32, sample_rate: f32, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let len = impulse_len(decay_secs, sample_rate);
        let channels = std::array::from_fn(|_| {
            (0..len)
                .map(|i| rng.gen_range(-1.0f32..1.0) * envelope(i, len))
                .collect()
        });

        Self {
            channels,
            sample_rate,
            decay_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub const fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub const fn decay_secs(&self) -> f32 {
        self.decay_secs
    }

    /// RMS-based scale that brings the wet level to a fixed loudness
    /// regardless of impulse length.
    pub fn normalization_scale(&self) -> f32 {
        let count = (CHANNELS * self.len()) as f32;
        let energy: f32 = self
            .channels
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|s| s * s)
            .sum();

        let mut power = (energy / count).sqrt();
        if !power.is_finite() || power < MIN_POWER {
            power = MIN_POWER;
        }

        GAIN_CALIBRATION / power * (GAIN_CALIBRATION_SAMPLE_RATE / self.sample_rate)
    }
}
