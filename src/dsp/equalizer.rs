use clap::ValueEnum;
use log::warn;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::dsp::Stage;
use crate::dsp::biquad::Biquad;
use crate::error::{Error, Result};
use crate::params::{
    BAND_COUNT, EQ_FREQUENCIES, EQ_GAIN_MAX_DB, EQ_GAIN_MIN_DB, EQ_Q, clamp_param,
};

/// Named 10-band curves selectable from the controller.
#[derive(ValueEnum, Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EqCurve {
    #[default]
    Flat,
    Bass,
    Treble,
    #[value(name = "vshape")]
    VShape,
    Vocal,
    Loudness,
}

impl EqCurve {
    pub const ALL: [Self; 6] = [
        Self::Flat,
        Self::Bass,
        Self::Treble,
        Self::VShape,
        Self::Vocal,
        Self::Loudness,
    ];

    pub const fn gains(self) -> [f32; BAND_COUNT] {
        match self {
            Self::Flat => [0.0; BAND_COUNT],
            Self::Bass => [6.0, 5.0, 4.0, 2.0, 0.0, -1.0, -1.0, 0.0, 1.0, 1.0],
            Self::Treble => [-2.0, -2.0, -1.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            Self::VShape => [4.0, 3.0, 2.0, 1.0, 0.0, 0.0, 0.0, 1.0, 3.0, 4.0],
            Self::Vocal => [-3.0, -2.0, -1.0, 1.0, 2.0, 3.0, 4.0, 2.0, 0.0, -1.0],
            Self::Loudness => [4.0, 3.0, 1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0],
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Bass => "bass",
            Self::Treble => "treble",
            Self::VShape => "vshape",
            Self::Vocal => "vocal",
            Self::Loudness => "loudness",
        }
    }

    /// Lenient lookup: unknown names select the flat curve.
    pub fn from_name_or_flat(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("Unknown EQ curve '{name}', using flat");
            Self::Flat
        })
    }
}

impl std::fmt::Display for EqCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EqCurve {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|curve| curve.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidFormat(format!("unknown EQ curve '{s}'")))
    }
}

/// A single peaking band as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    pub frequency: f32,
    pub gain_db: f32,
    pub q: f32,
}

/// Ten peaking filters in series, ordered by ascending centre frequency.
/// Frequencies and Q never change after construction.
pub struct EqualizerBank {
    bands: Vec<Biquad>,
}

impl EqualizerBank {
    pub fn new(sample_rate: f32) -> Result<Self> {
        Self::with_frequencies(&EQ_FREQUENCIES, sample_rate)
    }

    /// Build from an explicit frequency table. Anything other than
    /// `BAND_COUNT` strictly ascending positive frequencies is a build defect.
    pub fn with_frequencies(frequencies: &[f32], sample_rate: f32) -> Result<Self> {
        if frequencies.len() != BAND_COUNT {
            return Err(Error::FatalConfig(format!(
                "equalizer needs exactly {BAND_COUNT} bands, got {}",
                frequencies.len()
            )));
        }
        if frequencies.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return Err(Error::FatalConfig(
                "equalizer band frequencies must be positive".to_string(),
            ));
        }
        if frequencies.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(Error::FatalConfig(
                "equalizer band frequencies must be strictly ascending".to_string(),
            ));
        }

        Ok(Self {
            bands: frequencies
                .iter()
                .map(|&freq| Biquad::peaking(freq, EQ_Q, 0.0, sample_rate))
                .collect(),
        })
    }

    /// Returns false when `index` does not name a band.
    pub fn set_band_gain(&mut self, index: usize, gain_db: f32) -> bool {
        let Some(band) = self.bands.get_mut(index) else {
            return false;
        };
        if let Some(db) = clamp_param(gain_db, EQ_GAIN_MIN_DB, EQ_GAIN_MAX_DB) {
            band.set_gain_db(db);
        }
        true
    }

    /// Set every band at once. Missing trailing entries are flat, extra
    /// entries are ignored.
    pub fn set_gains(&mut self, gains: &[f32]) {
        for (i, band) in self.bands.iter_mut().enumerate() {
            let db = gains
                .get(i)
                .and_then(|&g| clamp_param(g, EQ_GAIN_MIN_DB, EQ_GAIN_MAX_DB))
                .unwrap_or(0.0);
            band.set_gain_db(db);
        }
    }

    pub fn apply_curve(&mut self, curve: EqCurve) {
        self.set_gains(&curve.gains());
    }

    pub fn band_gain(&self, index: usize) -> Option<f32> {
        self.bands.get(index).map(Biquad::gain_db)
    }

    pub fn gains(&self) -> [f32; BAND_COUNT] {
        let mut gains = [0.0; BAND_COUNT];
        for (g, band) in gains.iter_mut().zip(&self.bands) {
            *g = band.gain_db();
        }
        gains
    }

    pub fn bands(&self) -> impl Iterator<Item = EqBand> + '_ {
        self.bands.iter().map(|b| EqBand {
            frequency: b.frequency(),
            gain_db: b.gain_db(),
            q: EQ_Q,
        })
    }

    /// Combined magnitude response of all bands in dB.
    pub fn magnitude_db(&self, freq: f32) -> f32 {
        self.bands.iter().map(|b| b.magnitude_db(freq)).sum()
    }
}

impl Stage for EqualizerBank {
    fn process(&mut self, mut left: f32, mut right: f32) -> (f32, f32) {
        for band in &mut self.bands {
            left = band.process(0, left);
            right = band.process(1, right);
        }
        (left, right)
    }

    // Band-major order keeps each filter's coefficients hot for the whole block
    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        for band in &mut self.bands {
            for s in left.iter_mut() {
                *s = band.process(0, *s);
            }
            for s in right.iter_mut() {
                *s = band.process(1, *s);
            }
        }
    }

    fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    #[test]
    fn curves_apply_exact_gains() {
        let mut eq = EqualizerBank::new(SR).unwrap();
        for curve in EqCurve::ALL {
            eq.apply_curve(curve);
            assert_eq!(eq.gains(), curve.gains(), "curve {curve}");
        }

        eq.apply_curve(EqCurve::Vocal);
        assert_eq!(eq.band_gain(0), Some(-3.0));
        assert_eq!(eq.band_gain(4), Some(2.0));
    }

    #[test]
    fn curve_names_parse() {
        assert_eq!("vshape".parse::<EqCurve>(), Ok(EqCurve::VShape));
        assert_eq!("Vocal".parse::<EqCurve>(), Ok(EqCurve::Vocal));
        assert!("cathedral".parse::<EqCurve>().is_err());
        assert_eq!(EqCurve::from_name_or_flat("cathedral"), EqCurve::Flat);
    }

    #[test]
    fn band_gain_is_clamped() {
        let mut eq = EqualizerBank::new(SR).unwrap();
        assert!(eq.set_band_gain(3, 40.0));
        assert_eq!(eq.band_gain(3), Some(12.0));
        assert!(eq.set_band_gain(3, -40.0));
        assert_eq!(eq.band_gain(3), Some(-12.0));
        assert!(!eq.set_band_gain(10, 1.0));
    }

    #[test]
    fn short_gain_list_defaults_to_flat() {
        let mut eq = EqualizerBank::new(SR).unwrap();
        eq.apply_curve(EqCurve::Loudness);
        eq.set_gains(&[1.0, 2.0, 3.0]);
        assert_eq!(
            eq.gains(),
            [1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn bands_are_fixed_and_ascending() {
        let eq = EqualizerBank::new(SR).unwrap();
        let bands: Vec<EqBand> = eq.bands().collect();
        assert_eq!(bands.len(), BAND_COUNT);
        for (band, &freq) in bands.iter().zip(EQ_FREQUENCIES.iter()) {
            assert_eq!(band.frequency, freq);
            assert_eq!(band.q, 1.0);
        }
    }

    #[test]
    fn malformed_frequency_tables_are_fatal() {
        assert!(matches!(
            EqualizerBank::with_frequencies(&[100.0, 200.0], SR),
            Err(Error::FatalConfig(_))
        ));

        let mut descending = EQ_FREQUENCIES;
        descending.reverse();
        assert!(EqualizerBank::with_frequencies(&descending, SR).is_err());

        assert!(EqualizerBank::with_frequencies(&EQ_FREQUENCIES, SR).is_ok());
    }

    #[test]
    fn flat_bank_passes_signal_unchanged() {
        let mut eq = EqualizerBank::new(SR).unwrap();
        let mut left: Vec<f32> = (0..512).map(|i| (i as f32 * 0.05).sin()).collect();
        let mut right = left.clone();
        let expected = left.clone();

        eq.process_block(&mut left, &mut right);

        for (y, x) in left.iter().zip(&expected) {
            assert!((y - x).abs() < 1e-4);
        }
    }

    #[test]
    fn boosted_band_raises_response_at_its_centre() {
        let mut eq = EqualizerBank::new(SR).unwrap();
        eq.set_band_gain(5, 12.0);
        assert!(eq.magnitude_db(1000.0) > 11.0);
        assert!(eq.magnitude_db(32.0).abs() < 0.5);
    }
}
