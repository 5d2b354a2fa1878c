use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::error::{Error, Result};

pub const DEFAULT_WINDOW: usize = 2048;

/// Waveform tap on the processed signal.
///
/// The audio side writes into a private ring and publishes an immutable
/// snapshot once per block; readers only ever see completed blocks.
pub struct Visualizer {
    ring: Vec<f32>,
    write_pos: usize,
    sequence: u64,
    snapshot: Arc<ArcSwap<WaveformSnapshot>>,
}

#[derive(Clone)]
pub struct VisualizerHandle {
    snapshot: Arc<ArcSwap<WaveformSnapshot>>,
    window: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveformSnapshot {
    /// Number of blocks published so far. Zero means nothing was processed yet.
    pub sequence: u64,
    /// Oldest sample first, normalized to [-1, 1].
    pub samples: Arc<[f32]>,
}

impl WaveformSnapshot {
    fn silent(window: usize) -> Self {
        Self {
            sequence: 0,
            samples: vec![0.0; window].into(),
        }
    }
}

impl Visualizer {
    pub fn new(window: usize) -> Result<(Self, VisualizerHandle)> {
        if !window.is_power_of_two() {
            return Err(Error::FatalConfig(format!(
                "visualizer window must be a power of two, got {window}"
            )));
        }

        let snapshot = Arc::new(ArcSwap::from_pointee(WaveformSnapshot::silent(window)));

        Ok((
            Self {
                ring: vec![0.0; window],
                write_pos: 0,
                sequence: 0,
                snapshot: Arc::clone(&snapshot),
            },
            VisualizerHandle { snapshot, window },
        ))
    }

    pub fn window(&self) -> usize {
        self.ring.len()
    }

    /// Feed one processed stereo block and publish the resulting window.
    pub fn process(&mut self, left: &[f32], right: &[f32]) {
        let mask = self.ring.len() - 1;
        for (l, r) in left.iter().zip(right) {
            self.ring[self.write_pos] = 0.5 * (l + r);
            self.write_pos = (self.write_pos + 1) & mask;
        }

        self.sequence += 1;

        let (newer, older) = self.ring.split_at(self.write_pos);
        let samples: Arc<[f32]> = older
            .iter()
            .chain(newer)
            .map(|s| s.clamp(-1.0, 1.0))
            .collect();

        self.snapshot.store(Arc::new(WaveformSnapshot {
            sequence: self.sequence,
            samples,
        }));
    }

    pub fn reset(&mut self) {
        self.ring.fill(0.0);
        self.write_pos = 0;
        self.snapshot.store(Arc::new(WaveformSnapshot {
            sequence: self.sequence,
            samples: vec![0.0; self.ring.len()].into(),
        }));
    }
}

impl VisualizerHandle {
    pub fn window(&self) -> usize {
        self.window
    }

    /// Latest published snapshot. Never blocks the audio side.
    pub fn snapshot(&self) -> Arc<WaveformSnapshot> {
        self.snapshot.load_full()
    }

    pub fn sample_waveform(&self) -> Arc<[f32]> {
        Arc::clone(&self.snapshot.load().samples)
    }

    /// Snapshot quantised to bytes, 128 being silence.
    pub fn byte_time_domain(&self) -> Vec<u8> {
        self.snapshot
            .load()
            .samples
            .iter()
            .map(|&s| (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// Endless sequence of snapshots, one per `next()`. Polling faster than
    /// the audio side publishes yields the same snapshot again.
    pub fn snapshots(&self) -> impl Iterator<Item = Arc<WaveformSnapshot>> + '_ {
        std::iter::repeat_with(move || self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two_window() {
        assert!(matches!(
            Visualizer::new(1000),
            Err(Error::FatalConfig(_))
        ));
        assert!(Visualizer::new(0).is_err());
    }

    #[test]
    fn starts_silent() {
        let (_, handle) = Visualizer::new(DEFAULT_WINDOW).unwrap();
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.sequence, 0);
        assert_eq!(snapshot.samples.len(), DEFAULT_WINDOW);
        assert!(snapshot.samples.iter().all(|&s| s == 0.0));
        assert!(handle.byte_time_domain().iter().all(|&b| b == 128));
    }

    #[test]
    fn snapshot_is_mono_mix_oldest_first() {
        let (mut vis, handle) = Visualizer::new(8).unwrap();
        vis.process(&[0.2, 0.4, 0.6], &[0.0, 0.0, 0.0]);

        let samples = handle.sample_waveform();
        assert_eq!(samples.len(), 8);
        assert_eq!(&samples[..5], &[0.0; 5]);
        assert!((samples[5] - 0.1).abs() < 1e-6);
        assert!((samples[7] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn samples_are_clamped_and_quantised() {
        let (mut vis, handle) = Visualizer::new(4).unwrap();
        vis.process(&[3.0, -3.0, 0.5, 0.0], &[3.0, -3.0, 0.5, 0.0]);

        assert_eq!(&*handle.sample_waveform(), &[1.0, -1.0, 0.5, 0.0]);
        assert_eq!(handle.byte_time_domain(), vec![255, 0, 192, 128]);
    }

    #[test]
    fn snapshots_advance_with_blocks_and_old_data_is_overwritten() {
        let (mut vis, handle) = Visualizer::new(4).unwrap();
        let mut polls = handle.snapshots();

        vis.process(&[0.5; 4], &[0.5; 4]);
        let first = polls.next().unwrap();
        vis.process(&[-0.5; 4], &[-0.5; 4]);
        let second = polls.next().unwrap();
        let again = polls.next().unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(again, second);
        assert!(second.samples.iter().all(|&s| s == -0.5));
        // Earlier snapshots stay intact for whoever still holds them
        assert!(first.samples.iter().all(|&s| s == 0.5));
    }
}
