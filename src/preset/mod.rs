use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::params::{
    BAND_COUNT, EQ_GAIN_MAX_DB, EQ_GAIN_MIN_DB, GAIN_MAX_DB, GAIN_MIN_DB, ParameterState,
    clamp_param,
};

pub mod manager;

pub use crate::dsp::equalizer::EqCurve;
pub use manager::{Manager, StoredPreset};

/// The tonal-balance subset of the parameters: EQ gains, pre-amp and trim.
///
/// Serialized as a flat object `{ "eq": [..10..], "preamp": n, "trim": n }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub eq: [f32; BAND_COUNT],
    pub preamp: f32,
    pub trim: f32,
}

impl Default for Preset {
    fn default() -> Self {
        Self::from_curve(EqCurve::Flat)
    }
}

impl Preset {
    pub fn capture(state: &ParameterState) -> Self {
        Self {
            eq: state.eq_gains,
            preamp: state.preamp_db,
            trim: state.trim_db,
        }
    }

    pub fn from_curve(curve: EqCurve) -> Self {
        Self {
            eq: curve.gains(),
            preamp: 0.0,
            trim: 0.0,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// A validated preset document. Only `eq` is mandatory; absent or
/// non-numeric `preamp`/`trim` leave the current values alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetPatch {
    pub eq: [f32; BAND_COUNT],
    pub preamp: Option<f32>,
    pub trim: Option<f32>,
}

/// A typed preset carries every field, so any non-finite value rejects the
/// whole preset rather than skipping the bad entry.
impl TryFrom<Preset> for PresetPatch {
    type Error = Error;

    fn try_from(preset: Preset) -> Result<Self> {
        if let Some(i) = preset.eq.iter().position(|g| !g.is_finite()) {
            return Err(Error::InvalidFormat(format!("'eq[{i}]' is not finite")));
        }
        for (name, value) in [("preamp", preset.preamp), ("trim", preset.trim)] {
            if !value.is_finite() {
                return Err(Error::InvalidFormat(format!("'{name}' is not finite")));
            }
        }

        Ok(Self {
            eq: preset.eq,
            preamp: Some(preset.preamp),
            trim: Some(preset.trim),
        })
    }
}

impl PresetPatch {
    pub fn parse(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFormat(format!("not valid JSON: {e}")))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidFormat("preset must be a JSON object".to_string()))?;

        let entries = object
            .get("eq")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::InvalidFormat("'eq' must be an array".to_string()))?;

        if entries.len() != BAND_COUNT {
            return Err(Error::InvalidFormat(format!(
                "'eq' must have exactly {BAND_COUNT} entries, got {}",
                entries.len()
            )));
        }

        let mut eq = [0.0; BAND_COUNT];
        for (i, (gain, entry)) in eq.iter_mut().zip(entries).enumerate() {
            *gain = entry
                .as_f64()
                .ok_or_else(|| Error::InvalidFormat(format!("'eq[{i}]' is not a number")))?
                as f32;
        }

        let number = |key: &str| object.get(key).and_then(Value::as_f64).map(|v| v as f32);

        Ok(Self {
            eq,
            preamp: number("preamp"),
            trim: number("trim"),
        })
    }

    /// Write the patch into `state`, clamping every value into range.
    pub fn apply_to(&self, state: &mut ParameterState) {
        for (dst, &src) in state.eq_gains.iter_mut().zip(&self.eq) {
            if let Some(db) = clamp_param(src, EQ_GAIN_MIN_DB, EQ_GAIN_MAX_DB) {
                *dst = db;
            }
        }
        if let Some(db) = self
            .preamp
            .and_then(|v| clamp_param(v, GAIN_MIN_DB, GAIN_MAX_DB))
        {
            state.preamp_db = db;
        }
        if let Some(db) = self
            .trim
            .and_then(|v| clamp_param(v, GAIN_MIN_DB, GAIN_MAX_DB))
        {
            state.trim_db = db;
        }
    }
}
