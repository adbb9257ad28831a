//! Benchmarks for per-scene indices and median compositing

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use orbita_algorithms::imagery::{
    compute_indices, median_composite, BandSet, CompositeParams, IndexSet,
};
use orbita_core::{GeoTransform, Raster};

fn create_band(size: usize, base: f64, seed: usize) -> Raster<f64> {
    let mut r = Raster::new(size, size).with_geo(GeoTransform::new(0.0, size as f64, 1.0, -1.0), None);
    for row in 0..size {
        for col in 0..size {
            let v = base + ((row * 7 + col * 13 + seed * 31) % 200) as f64 * 0.001;
            r.set(row, col, v).unwrap();
        }
    }
    r
}

fn create_scene(size: usize, seed: usize) -> BandSet {
    BandSet {
        blue: create_band(size, 0.03, seed),
        red: create_band(size, 0.06, seed),
        red_edge: Some(create_band(size, 0.15, seed)),
        nir: create_band(size, 0.30, seed),
        swir1: create_band(size, 0.20, seed),
    }
}

fn bench_indices(c: &mut Criterion) {
    let mut group = c.benchmark_group("imagery/indices");
    for size in [256, 512, 1024] {
        let scene = create_scene(size, 0);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| compute_indices(black_box(&scene)).unwrap())
        });
    }
    group.finish();
}

fn bench_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("imagery/median_composite");
    for scenes in [4, 12, 24] {
        let stack: Vec<IndexSet> = (0..scenes)
            .map(|s| compute_indices(&create_scene(256, s)).unwrap())
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(scenes), &scenes, |b, _| {
            b.iter(|| median_composite(black_box(&stack), CompositeParams::default()).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_indices, bench_composite);
criterion_main!(benches);
