//! Engine throughput benchmarks

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use r128_engine::{BlockSource, MeterConfig, MeteringEngine, NoiseSource, SampleBlock};

fn bench_process_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_process");

    for &frames in &[64usize, 256, 1024] {
        let (mut engine, mut handle) = MeteringEngine::new(MeterConfig::default()).unwrap();
        engine.start().unwrap();

        let mut source = NoiseSource::new(48_000, 2, -18.0, 42).unwrap();
        let mut buffer = vec![0.0f32; frames * 2];
        source.fill(&mut buffer);

        group.bench_with_input(BenchmarkId::from_parameter(frames), &frames, |b, _| {
            let block = SampleBlock::interleaved(&buffer, 2, 48_000).unwrap();
            b.iter(|| {
                black_box(engine.process(&block).unwrap());
                black_box(handle.latest())
            })
        });
    }

    group.finish();
}

fn bench_surround(c: &mut Criterion) {
    let (mut engine, _handle) = MeteringEngine::new(MeterConfig::new(48_000, 6)).unwrap();
    engine.start().unwrap();

    let buffer: Vec<f32> = (0..512 * 6).map(|i| ((i as f32) * 0.013).sin() * 0.3).collect();

    let block = SampleBlock::interleaved(&buffer, 6, 48_000).unwrap();
    c.bench_function("engine_process_5_1_512", |b| {
        b.iter(|| black_box(engine.process(&block).unwrap()))
    });
}

criterion_group!(benches, bench_process_block, bench_surround);
criterion_main!(benches);
