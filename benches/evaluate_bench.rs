use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use plasma_fractal::fractal::{
    evaluate, render_reference, FractalParameters, GradientImage, LogicalCoordinate,
};
use plasma_fractal::normal_table::NormalTable;

fn table_benchmark(c: &mut Criterion) {
    c.bench_function("normal_table_sequential", |b| {
        b.iter(|| black_box(NormalTable::build_sequential()))
    });
}

fn evaluate_benchmark(c: &mut Criterion) {
    let table = NormalTable::build_sequential();
    let mut group = c.benchmark_group("evaluate");

    for depth in [4, 8, 15] {
        let params = FractalParameters {
            seed: 1,
            depth,
            ..FractalParameters::default()
        };
        let coord = LogicalCoordinate {
            x: 17_920,
            y: 41_472,
        };
        group.bench_with_input(BenchmarkId::from_parameter(depth), &params, |b, params| {
            b.iter(|| black_box(evaluate(black_box(coord), params, &table)))
        });
    }

    group.finish();
}

fn reference_benchmark(c: &mut Criterion) {
    let table = NormalTable::build_sequential();
    let gradient = GradientImage::white_to_black(256);
    let params = FractalParameters {
        seed: 1,
        ..FractalParameters::default()
    };
    let mut group = c.benchmark_group("render_reference");

    for size in [64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| black_box(render_reference(&params, &gradient, &table, size, size)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    table_benchmark,
    evaluate_benchmark,
    reference_benchmark
);
criterion_main!(benches);
