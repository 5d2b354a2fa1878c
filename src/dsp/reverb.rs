use log::debug;

use crate::dsp::Stage;
use crate::dsp::common::SmoothedValue;
use crate::ir::ReverbKernel;
use crate::params::{ReverbParams, clamp_param};

/// Samples over which an outgoing kernel is faded into the incoming one.
pub const KERNEL_FADE_LEN: usize = 1024;

/// Convolution reverb mixed in parallel with the dry signal.
///
/// Dry gain is fixed at 1.0 and the wet gain is the mix value, an equal-gain
/// law rather than equal-power. A disabled reverb keeps its place in the
/// chain with the wet gain pulled to zero.
pub struct ReverbStage {
    kernel: Box<ReverbKernel>,
    // Kernel being faded out after a swap
    outgoing: Option<Box<ReverbKernel>>,
    fade_pos: usize,
    enabled: bool,
    mix: f32,
    wet: SmoothedValue,
    // The convolvers are skipped while the wet gain is parked at zero
    idle: bool,
}

impl ReverbStage {
    pub fn new(
        params: &ReverbParams,
        kernel: Box<ReverbKernel>,
        smoothing_ms: f32,
        sample_rate: f32,
    ) -> Self {
        let mix = clamp_param(params.mix, 0.0, 1.0).unwrap_or(0.0);
        let wet = if params.enabled { mix } else { 0.0 };
        Self {
            kernel,
            outgoing: None,
            fade_pos: 0,
            enabled: params.enabled,
            mix,
            wet: SmoothedValue::new(wet, smoothing_ms, sample_rate),
            idle: wet == 0.0,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.update_wet();
    }

    pub fn set_mix(&mut self, mix: f32) {
        if let Some(mix) = clamp_param(mix, 0.0, 1.0) {
            self.mix = mix;
            self.update_wet();
        }
    }

    fn update_wet(&mut self) {
        self.wet.set_target(if self.enabled { self.mix } else { 0.0 });
    }

    /// Install a freshly prepared kernel. The displaced kernel is faded out
    /// over `KERNEL_FADE_LEN` samples; a kernel that was still fading from an
    /// earlier swap is returned to the caller.
    pub fn swap_kernel(&mut self, kernel: Box<ReverbKernel>) -> Option<Box<ReverbKernel>> {
        let previous = std::mem::replace(&mut self.kernel, kernel);
        debug!(
            "Reverb kernel swapped: {:.2}s -> {:.2}s",
            previous.impulse().decay_secs(),
            self.kernel.impulse().decay_secs()
        );

        if self.idle {
            // Nothing audible to fade from
            return Some(previous);
        }

        self.fade_pos = 0;
        self.outgoing.replace(previous)
    }

    pub fn kernel(&self) -> &ReverbKernel {
        &self.kernel
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub const fn mix(&self) -> f32 {
        self.mix
    }

    /// Wet gain the mixer is ramping towards.
    pub const fn wet_gain(&self) -> f32 {
        self.wet.target()
    }

    pub const fn is_fading(&self) -> bool {
        self.outgoing.is_some()
    }
}

impl Stage for ReverbStage {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        if self.idle {
            if self.wet.target() == 0.0 {
                return (left, right);
            }
            // Waking up: start from an empty tail rather than stale input
            self.idle = false;
            self.kernel.reset();
        }

        let (mut wet_l, mut wet_r) = self.kernel.process(left, right);

        if let Some(outgoing) = self.outgoing.as_mut() {
            let (old_l, old_r) = outgoing.process(left, right);
            let t = self.fade_pos as f32 / KERNEL_FADE_LEN as f32;
            wet_l = (1.0 - t).mul_add(old_l, t * wet_l);
            wet_r = (1.0 - t).mul_add(old_r, t * wet_r);

            self.fade_pos += 1;
            if self.fade_pos >= KERNEL_FADE_LEN {
                self.outgoing = None;
            }
        }

        let w = self.wet.next_value();
        if w == 0.0 && self.wet.is_settled() {
            self.idle = true;
            self.outgoing = None;
        }

        (w.mul_add(wet_l, left), w.mul_add(wet_r, right))
    }

    fn reset(&mut self) {
        self.kernel.reset();
        self.outgoing = None;
        self.fade_pos = 0;
        self.wet.snap(self.wet.target());
        self.idle = self.wet.target() == 0.0;
    }
}
