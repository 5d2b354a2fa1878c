use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use rusteq::ir::{ImpulseResponse, ReverbKernel, TwoStageConvolver};

const SAMPLE_RATE: f32 = 48000.0;

fn bench_synthesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("Impulse Synthesis");

    for &decay in &[0.5f32, 2.5, 10.0] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{decay}s")),
            &decay,
            |b, &decay| {
                b.iter(|| ImpulseResponse::synthesize(black_box(decay), SAMPLE_RATE, Some(7)));
            },
        );
    }

    group.finish();
}

fn bench_kernel_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("Kernel Preparation");

    for &decay in &[0.5f32, 2.5, 10.0] {
        let impulse = Arc::new(ImpulseResponse::synthesize(decay, SAMPLE_RATE, Some(7)));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{decay}s")),
            &impulse,
            |b, impulse| {
                b.iter(|| ReverbKernel::prepare(Arc::clone(black_box(impulse))).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_convolver_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("Convolver Block");

    for &len in &[1_000usize, 24_000, 120_000] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let ir: Vec<f32> = (0..len).map(|i| 1.0 / (i + 1) as f32).collect();
            let mut conv = TwoStageConvolver::new(&ir).unwrap();
            let mut samples = vec![0.5f32; 128];

            for _ in 0..100 {
                conv.process_block(&mut samples);
            }

            b.iter(|| {
                conv.process_block(black_box(&mut samples));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_synthesis,
    bench_kernel_prepare,
    bench_convolver_block
);
criterion_main!(benches);
