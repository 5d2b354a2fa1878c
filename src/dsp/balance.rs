use crate::dsp::Stage;
use crate::dsp::common::SmoothedValue;
use crate::params::clamp_param;

/// Linear balance law: -1 is hard left, 0 leaves both channels at unity,
/// +1 is hard right.
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let left = (1.0 - pan.max(0.0)).clamp(0.0, 1.0);
    let right = (1.0 + pan.min(0.0)).clamp(0.0, 1.0);
    (left, right)
}

/// Split, per-channel gain, merge.
pub struct StereoBalance {
    pan: f32,
    left: SmoothedValue,
    right: SmoothedValue,
}

impl StereoBalance {
    pub fn new(pan: f32, smoothing_ms: f32, sample_rate: f32) -> Self {
        let pan = clamp_param(pan, -1.0, 1.0).unwrap_or(0.0);
        let (l, r) = pan_gains(pan);
        Self {
            pan,
            left: SmoothedValue::new(l, smoothing_ms, sample_rate),
            right: SmoothedValue::new(r, smoothing_ms, sample_rate),
        }
    }

    pub fn set_pan(&mut self, pan: f32) {
        let Some(pan) = clamp_param(pan, -1.0, 1.0) else {
            return;
        };
        self.pan = pan;
        let (l, r) = pan_gains(pan);
        self.left.set_target(l);
        self.right.set_target(r);
    }

    pub const fn pan(&self) -> f32 {
        self.pan
    }

    /// Target (left, right) gains.
    pub const fn gains(&self) -> (f32, f32) {
        (self.left.target(), self.right.target())
    }
}

impl Stage for StereoBalance {
    #[inline]
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (left * self.left.next_value(), right * self.right.next_value())
    }

    fn reset(&mut self) {
        self.left.snap(self.left.target());
        self.right.snap(self.right.target());
    }
}
