use anyhow::{Result, anyhow};
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::sync::Arc;

/// Head length and tail partition size in samples.
pub const PARTITION_SIZE: usize = 256;
const FFT_SIZE: usize = PARTITION_SIZE * 2;
const NUM_BINS: usize = FFT_SIZE / 2 + 1;

/// Two-stage convolver: time-domain FIR for the first `PARTITION_SIZE`
/// taps (zero latency), uniformly partitioned overlap-save FFT convolution
/// for the rest of the impulse.
///
/// The tail of partition `m` finishes computing exactly one partition after
/// its input arrived, which is the delay the tail taps carry anyway, so the
/// two stages line up without added latency.
///
/// Tail partitions 1.. only need input spectra that already exist, so their
/// multiply-accumulate is spread over the samples of the running partition.
/// A partition boundary then costs one forward FFT, one spectrum product and
/// one inverse FFT regardless of the impulse length.
///
/// All allocation happens in `new`; `process_sample` and `reset` are
/// allocation-free.
pub struct TwoStageConvolver {
    // Head (time-domain FIR)
    head_coeffs: Vec<f32>,
    head_ring: Vec<f32>,
    head_write_pos: usize,

    // Tail partitions, already in the frequency domain
    tail_partitions: Vec<Vec<Complex<f32>>>,

    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,

    // Previous and current input partitions, back to back
    frame: Vec<f32>,
    input_pos: usize,

    // Frequency delay line of past input spectra
    history: Vec<Vec<Complex<f32>>>,
    history_head: usize,

    // Tail output for the partition currently being played
    tail_out: Vec<f32>,

    // Sum over partitions 1.. for the next boundary, built up sample by sample
    pending: Vec<Complex<f32>>,
    pending_next: usize,
    partitions_per_sample: usize,

    // Scratch buffers
    time_scratch: Vec<f32>,
    freq_scratch: Vec<Complex<f32>>,
    freq_accumulator: Vec<Complex<f32>>,
    r2c_scratch: Vec<Complex<f32>>,
    c2r_scratch: Vec<Complex<f32>>,
}

impl TwoStageConvolver {
    pub fn new(ir: &[f32]) -> Result<Self> {
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(FFT_SIZE);
        let c2r = planner.plan_fft_inverse(FFT_SIZE);
        let mut r2c_scratch = r2c.make_scratch_vec();
        let c2r_scratch = c2r.make_scratch_vec();

        let head_len = ir.len().min(PARTITION_SIZE);
        let mut head_coeffs = vec![0.0; PARTITION_SIZE];
        head_coeffs[..head_len].copy_from_slice(&ir[..head_len]);

        let tail = ir.get(PARTITION_SIZE..).unwrap_or(&[]);
        let mut tail_partitions = Vec::with_capacity(tail.len().div_ceil(PARTITION_SIZE));
        for chunk in tail.chunks(PARTITION_SIZE) {
            // Zero-pad each partition to the FFT size
            let mut time_block = vec![0.0f32; FFT_SIZE];
            time_block[..chunk.len()].copy_from_slice(chunk);

            let mut freq_block = vec![Complex::new(0.0, 0.0); NUM_BINS];
            r2c.process_with_scratch(&mut time_block, &mut freq_block, &mut r2c_scratch)
                .map_err(|e| anyhow!("FFT failed during IR partitioning: {e}"))?;

            tail_partitions.push(freq_block);
        }

        let history = vec![vec![Complex::new(0.0, 0.0); NUM_BINS]; tail_partitions.len()];
        let partitions_per_sample = tail_partitions
            .len()
            .saturating_sub(1)
            .div_ceil(PARTITION_SIZE);

        Ok(Self {
            head_coeffs,
            head_ring: vec![0.0; PARTITION_SIZE],
            head_write_pos: 0,

            tail_partitions,

            r2c,
            c2r,

            frame: vec![0.0; FFT_SIZE],
            input_pos: 0,

            history,
            history_head: 0,

            tail_out: vec![0.0; PARTITION_SIZE],

            pending: vec![Complex::new(0.0, 0.0); NUM_BINS],
            pending_next: 1,
            partitions_per_sample,

            time_scratch: vec![0.0; FFT_SIZE],
            freq_scratch: vec![Complex::new(0.0, 0.0); NUM_BINS],
            freq_accumulator: vec![Complex::new(0.0, 0.0); NUM_BINS],
            r2c_scratch,
            c2r_scratch,
        })
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        // === Head (zero latency) ===
        self.head_ring[self.head_write_pos] = input;

        let mut head_out = 0.0f32;
        let mut idx = self.head_write_pos;
        for &coeff in &self.head_coeffs {
            head_out += coeff * self.head_ring[idx];
            idx = if idx == 0 { PARTITION_SIZE - 1 } else { idx - 1 };
        }
        self.head_write_pos = (self.head_write_pos + 1) % PARTITION_SIZE;

        if self.tail_partitions.is_empty() {
            return head_out;
        }

        // === Tail (one partition behind, as the taps require) ===
        let tail_out = self.tail_out[self.input_pos];
        self.frame[PARTITION_SIZE + self.input_pos] = input;
        self.input_pos += 1;
        self.accumulate_pending(self.partitions_per_sample);

        if self.input_pos == PARTITION_SIZE {
            self.process_tail_partition();
            self.input_pos = 0;
        }

        head_out + tail_out
    }

    pub fn process_block(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Fold up to `count` more of partitions 1.. into `pending`.
    fn accumulate_pending(&mut self, count: usize) {
        let len = self.history.len();
        let end = (self.pending_next + count).min(len);
        for j in self.pending_next..end {
            // Slot `history_head` receives the next spectrum, so partition j
            // pairs with the one written j boundaries before it
            let spectrum = &self.history[(self.history_head + len - j) % len];
            multiply_accumulate(&mut self.pending, spectrum, &self.tail_partitions[j]);
        }
        self.pending_next = end;
    }

    fn process_tail_partition(&mut self) {
        let len = self.history.len();
        // No-op unless the per-sample share fell short
        self.accumulate_pending(len);

        self.time_scratch.copy_from_slice(&self.frame);
        // The current partition becomes the previous one for the next frame
        self.frame.copy_within(PARTITION_SIZE.., 0);

        let transformed = self
            .r2c
            .process_with_scratch(
                &mut self.time_scratch,
                &mut self.freq_scratch,
                &mut self.r2c_scratch,
            )
            .is_ok();

        if transformed {
            self.history[self.history_head].copy_from_slice(&self.freq_scratch);
            self.freq_accumulator.copy_from_slice(&self.pending);
            multiply_accumulate(
                &mut self.freq_accumulator,
                &self.freq_scratch,
                &self.tail_partitions[0],
            );
        } else {
            self.history[self.history_head].fill(Complex::new(0.0, 0.0));
        }
        self.history_head = (self.history_head + 1) % len;
        self.pending.fill(Complex::new(0.0, 0.0));
        self.pending_next = 1;

        if !transformed {
            self.tail_out.fill(0.0);
            return;
        }

        // DC and Nyquist must be real for the inverse transform
        self.freq_accumulator[0].im = 0.0;
        if let Some(last) = self.freq_accumulator.last_mut() {
            last.im = 0.0;
        }

        if self
            .c2r
            .process_with_scratch(
                &mut self.freq_accumulator,
                &mut self.time_scratch,
                &mut self.c2r_scratch,
            )
            .is_err()
        {
            self.tail_out.fill(0.0);
            return;
        }

        // Overlap-save: only the second half is free of circular wrap
        let scale = 1.0 / FFT_SIZE as f32;
        for (out, &y) in self
            .tail_out
            .iter_mut()
            .zip(&self.time_scratch[PARTITION_SIZE..])
        {
            *out = zap_denormal(y * scale);
        }
    }

    pub fn reset(&mut self) {
        self.head_ring.fill(0.0);
        self.head_write_pos = 0;

        self.frame.fill(0.0);
        self.input_pos = 0;

        self.history_head = 0;
        for spectrum in &mut self.history {
            spectrum.fill(Complex::new(0.0, 0.0));
        }

        self.tail_out.fill(0.0);
        self.pending.fill(Complex::new(0.0, 0.0));
        self.pending_next = 1;
        self.time_scratch.fill(0.0);
        self.freq_scratch.fill(Complex::new(0.0, 0.0));
        self.freq_accumulator.fill(Complex::new(0.0, 0.0));
    }

    pub fn num_tail_partitions(&self) -> usize {
        self.tail_partitions.len()
    }

    /// Tail partitions folded in per input sample.
    pub const fn partitions_per_sample(&self) -> usize {
        self.partitions_per_sample
    }
}

#[inline]
fn multiply_accumulate(acc: &mut [Complex<f32>], x: &[Complex<f32>], h: &[Complex<f32>]) {
    for ((a, x), h) in acc.iter_mut().zip(x).zip(h) {
        *a += x * h;
    }
}

#[inline]
fn zap_denormal(x: f32) -> f32 {
    if x.abs() < 1.0e-30 { 0.0 } else { x }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_response_of(conv: &mut TwoStageConvolver, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| conv.process_sample(if i == 0 { 1.0 } else { 0.0 }))
            .collect()
    }

    #[test]
    fn short_ir_uses_head_only() {
        let mut conv = TwoStageConvolver::new(&[1.0, 0.5, 0.25]).unwrap();
        assert_eq!(conv.num_tail_partitions(), 0);

        let out = impulse_response_of(&mut conv, 5);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!((out[2] - 0.25).abs() < 1e-6);
        assert!(out[3].abs() < 1e-6);
    }

    #[test]
    fn long_ir_reproduces_itself_exactly_in_time() {
        let ir: Vec<f32> = (0..1500).map(|i| ((i as f32) * 0.3).sin() / (1.0 + i as f32 * 0.01)).collect();
        let mut conv = TwoStageConvolver::new(&ir).unwrap();
        assert_eq!(conv.num_tail_partitions(), (1500 - PARTITION_SIZE).div_ceil(PARTITION_SIZE));

        let out = impulse_response_of(&mut conv, 2000);
        for (i, (&y, &h)) in out.iter().zip(ir.iter()).enumerate() {
            assert!((y - h).abs() < 1e-4, "sample {i}: got {y}, expected {h}");
        }
        for &y in &out[ir.len()..] {
            assert!(y.abs() < 1e-4);
        }
    }

    #[test]
    fn matches_direct_convolution_for_arbitrary_input() {
        let ir: Vec<f32> = (0..700).map(|i| 1.0 / (i + 1) as f32).collect();
        let input: Vec<f32> = (0..1200).map(|i| ((i * 7919) % 13) as f32 / 13.0 - 0.5).collect();

        let mut conv = TwoStageConvolver::new(&ir).unwrap();
        let mut out = input.clone();
        conv.process_block(&mut out);

        for n in 0..input.len() {
            let expected: f32 = (0..=n.min(ir.len() - 1)).map(|k| ir[k] * input[n - k]).sum();
            assert!(
                (out[n] - expected).abs() < 1e-3,
                "sample {n}: got {}, expected {expected}",
                out[n]
            );
        }
    }

    #[test]
    fn long_tail_work_is_spread_across_the_partition() {
        // More tail partitions than samples per partition
        let len = PARTITION_SIZE * 300;
        let ir: Vec<f32> = (0..len)
            .map(|i| ((i % 97) as f32 - 48.0) / 48.0 * (-(i as f32) / len as f32).exp())
            .collect();
        let mut conv = TwoStageConvolver::new(&ir).unwrap();
        assert_eq!(conv.num_tail_partitions(), 299);
        assert_eq!(conv.partitions_per_sample(), 2);
        assert!(conv.partitions_per_sample() * PARTITION_SIZE >= conv.num_tail_partitions() - 1);

        let out = impulse_response_of(&mut conv, len);
        for (i, (&y, &h)) in out.iter().zip(ir.iter()).enumerate() {
            assert!((y - h).abs() < 1e-4, "sample {i}: got {y}, expected {h}");
        }
    }

    #[test]
    fn reset_clears_tail() {
        let ir: Vec<f32> = vec![0.5; 1000];
        let mut conv = TwoStageConvolver::new(&ir).unwrap();
        for _ in 0..600 {
            conv.process_sample(1.0);
        }
        conv.reset();
        for _ in 0..1200 {
            assert_eq!(conv.process_sample(0.0), 0.0);
        }
    }
}
