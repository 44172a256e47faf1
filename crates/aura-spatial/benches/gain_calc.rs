//! Gain calculation benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use aura_spatial::{
    GainCalculator, Layout, ObjectMetadata, PointSourcePanner, PolarPosition,
};

fn bench_point_source(c: &mut Criterion) {
    let layout = Layout::named("4+5+0").unwrap().without_lfe();
    let psp = PointSourcePanner::new(&layout).unwrap();
    let position = PolarPosition::new(37.0, 12.0, 1.0).to_cartesian();
    let mut gains = Vec::new();

    c.bench_function("point_source_4_5_0", |b| {
        b.iter(|| {
            psp.calculate_gains(black_box(&position), &mut gains);
        })
    });
}

fn bench_pipeline_point(c: &mut Criterion) {
    let mut calc = GainCalculator::new(Layout::named("4+5+0").unwrap()).unwrap();
    let metadata = ObjectMetadata {
        position: PolarPosition::new(37.0, 12.0, 1.0).into(),
        ..Default::default()
    };
    let (mut direct, mut diffuse) = (Vec::new(), Vec::new());
    // Pre-warm the scratch buffers so the steady state is measured
    calc.calculate_gains(&metadata, &mut direct, &mut diffuse).unwrap();

    c.bench_function("pipeline_point_4_5_0", |b| {
        b.iter(|| {
            calc.calculate_gains(black_box(&metadata), &mut direct, &mut diffuse)
                .unwrap();
        })
    });
}

fn bench_pipeline_extent(c: &mut Criterion) {
    let mut calc = GainCalculator::new(Layout::named("4+5+0").unwrap()).unwrap();
    let metadata = ObjectMetadata {
        position: PolarPosition::new(37.0, 12.0, 1.0).into(),
        width: 45.0,
        height: 20.0,
        depth: 0.2,
        ..Default::default()
    };
    let (mut direct, mut diffuse) = (Vec::new(), Vec::new());
    calc.calculate_gains(&metadata, &mut direct, &mut diffuse).unwrap();

    c.bench_function("pipeline_extent_4_5_0", |b| {
        b.iter(|| {
            calc.calculate_gains(black_box(&metadata), &mut direct, &mut diffuse)
                .unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_point_source,
    bench_pipeline_point,
    bench_pipeline_extent
);
criterion_main!(benches);
