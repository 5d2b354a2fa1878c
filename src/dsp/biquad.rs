//! Second-order IIR sections used by the equalizer and tone stages.
//!
//! Coefficients follow the Audio EQ Cookbook (RBJ), the same formulas the
//! Web Audio `BiquadFilterNode` uses.
//! Reference: <https://www.w3.org/TR/audio-eq-cookbook/>

use std::f64::consts::{FRAC_1_SQRT_2, PI};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterKind {
    /// Bell boost/cut around the centre frequency.
    Peaking { q: f32 },
    /// Boost/cut below the corner frequency, shelf slope of 1.
    LowShelf,
}

#[derive(Debug, Clone, Copy, Default)]
struct Coefficients {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Coefficients {
    fn calculate(kind: FilterKind, sample_rate: f64, frequency: f64, gain_db: f64) -> Self {
        // Keep the corner strictly below Nyquist
        let freq = frequency.clamp(1.0, (sample_rate / 2.0 - 1.0).max(1.0));
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let a = 10f64.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            FilterKind::Peaking { q } => {
                let alpha = sin_w0 / (2.0 * f64::from(q).max(1e-4));
                (
                    alpha.mul_add(a, 1.0),
                    -2.0 * cos_w0,
                    (-alpha).mul_add(a, 1.0),
                    1.0 + alpha / a,
                    -2.0 * cos_w0,
                    1.0 - alpha / a,
                )
            }
            FilterKind::LowShelf => {
                // S = 1 is equivalent to Q = 1/sqrt(2)
                let alpha = sin_w0 / (2.0 * FRAC_1_SQRT_2);
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct State {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl State {
    #[inline]
    fn process(&mut self, input: f64, c: &Coefficients) -> f64 {
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }
}

/// Stereo biquad with fixed kind and frequency; only the gain moves at runtime.
#[derive(Debug, Clone)]
pub struct Biquad {
    kind: FilterKind,
    frequency: f32,
    gain_db: f32,
    sample_rate: f32,
    coeffs: Coefficients,
    state: [State; 2],
}

impl Biquad {
    pub fn new(kind: FilterKind, frequency: f32, gain_db: f32, sample_rate: f32) -> Self {
        Self {
            kind,
            frequency,
            gain_db,
            sample_rate,
            coeffs: Coefficients::calculate(
                kind,
                f64::from(sample_rate),
                f64::from(frequency),
                f64::from(gain_db),
            ),
            state: [State::default(); 2],
        }
    }

    pub fn peaking(frequency: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        Self::new(FilterKind::Peaking { q }, frequency, gain_db, sample_rate)
    }

    pub fn low_shelf(frequency: f32, gain_db: f32, sample_rate: f32) -> Self {
        Self::new(FilterKind::LowShelf, frequency, gain_db, sample_rate)
    }

    pub const fn frequency(&self) -> f32 {
        self.frequency
    }

    pub const fn gain_db(&self) -> f32 {
        self.gain_db
    }

    pub fn set_gain_db(&mut self, gain_db: f32) {
        if gain_db == self.gain_db {
            return;
        }
        self.gain_db = gain_db;
        self.coeffs = Coefficients::calculate(
            self.kind,
            f64::from(self.sample_rate),
            f64::from(self.frequency),
            f64::from(gain_db),
        );
    }

    #[inline]
    pub fn process(&mut self, channel: usize, input: f32) -> f32 {
        self.state[channel].process(f64::from(input), &self.coeffs) as f32
    }

    pub fn reset(&mut self) {
        self.state = [State::default(); 2];
    }

    /// Magnitude response in dB at `freq`, evaluated from the current coefficients.
    pub fn magnitude_db(&self, freq: f32) -> f32 {
        let w = 2.0 * PI * f64::from(freq) / f64::from(self.sample_rate);
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();
        let c = &self.coeffs;

        let num_re = c.b0 + c.b1 * c1 + c.b2 * c2;
        let num_im = -(c.b1 * s1 + c.b2 * s2);
        let den_re = 1.0 + c.a1 * c1 + c.a2 * c2;
        let den_im = -(c.a1 * s1 + c.a2 * s2);

        let mag = ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt();
        (20.0 * mag.log10()) as f32
    }
}
