pub mod balance;
pub mod biquad;
pub mod common;
pub mod dynamics;
pub mod equalizer;
pub mod gain;
pub mod reverb;
pub mod tone;

// The core trait that all processing stages implement.
// Stages are stereo: channel 0 is left, channel 1 is right.
pub trait Stage: Send + Sync + 'static {
    // Process a single stereo frame through this stage
    fn process(&mut self, left: f32, right: f32) -> (f32, f32);

    // Process a block of frames in place. Both slices have the same length.
    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.process(*l, *r);
        }
    }

    // Clear filter memory and finish any pending ramps
    fn reset(&mut self);
}
