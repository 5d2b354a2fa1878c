pub mod convolver;
pub mod impulse;

pub use convolver::TwoStageConvolver;
pub use impulse::ImpulseResponse;

use anyhow::Result;
use std::sync::Arc;

use impulse::CHANNELS;

/// A stereo impulse together with the convolvers prepared for it.
///
/// Preparing a kernel partitions and transforms the whole impulse, so it is
/// built on the controller side and handed to the audio side ready to run.
pub struct ReverbKernel {
    impulse: Arc<ImpulseResponse>,
    convolvers: [TwoStageConvolver; CHANNELS],
}

impl ReverbKernel {
    pub fn prepare(impulse: Arc<ImpulseResponse>) -> Result<Self> {
        let scale = impulse.normalization_scale();
        let scaled = |ch: usize| -> Vec<f32> {
            impulse.channel(ch).iter().map(|s| s * scale).collect()
        };

        let convolvers = [
            TwoStageConvolver::new(&scaled(0))?,
            TwoStageConvolver::new(&scaled(1))?,
        ];

        Ok(Self {
            impulse,
            convolvers,
        })
    }

    /// Synthesize an impulse and prepare it in one go.
    pub fn build(decay_secs: f32, sample_rate: f32, seed: Option<u64>) -> Result<Self> {
        Self::prepare(Arc::new(ImpulseResponse::synthesize(
            decay_secs,
            sample_rate,
            seed,
        )))
    }

    pub fn impulse(&self) -> &Arc<ImpulseResponse> {
        &self.impulse
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (
            self.convolvers[0].process_sample(left),
            self.convolvers[1].process_sample(right),
        )
    }

    pub fn reset(&mut self) {
        for conv in &mut self.convolvers {
            conv.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_keeps_its_impulse() {
        let kernel = ReverbKernel::build(0.25, 48_000.0, Some(5)).unwrap();
        assert_eq!(kernel.impulse().len(), 12_000);
        assert_eq!(kernel.impulse().decay_secs(), 0.25);
    }

    #[test]
    fn kernel_output_is_scaled_impulse() {
        let impulse = Arc::new(ImpulseResponse::synthesize(0.05, 48_000.0, Some(9)));
        let scale = impulse.normalization_scale();
        let mut kernel = ReverbKernel::prepare(Arc::clone(&impulse)).unwrap();

        let (l0, r0) = kernel.process(1.0, 1.0);
        assert!((l0 - impulse.channel(0)[0] * scale).abs() < 1e-5);
        assert!((r0 - impulse.channel(1)[0] * scale).abs() < 1e-5);

        for i in 1..impulse.len() {
            let (l, _) = kernel.process(0.0, 0.0);
            assert!((l - impulse.channel(0)[i] * scale).abs() < 1e-4, "sample {i}");
        }
    }
}
