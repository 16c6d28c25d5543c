//! Performance benchmarks for rasterization, inference and training steps
//!
//! Run with: cargo bench --bench classifier_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glyphnet_core::data::synthetic::generate_glyph_dataset;
use glyphnet_core::raster::area_resample;
use glyphnet_core::{rasterize, Classifier, ClassifierConfig, DrawingSurface, Point, StrokePath};

/// Benchmark resampling a drawn canvas down to 28×28
fn bench_rasterize(c: &mut Criterion) {
    let mut group = c.benchmark_group("rasterize");

    for canvas in [140u32, 280, 560] {
        let mut surface = DrawingSurface::new(canvas, canvas, 16.0).unwrap();
        let scale = canvas as f32;
        let stroke: StrokePath = [(0.2, 0.2), (0.5, 0.8), (0.8, 0.2)]
            .into_iter()
            .map(|(x, y)| Point::new(x * scale, y * scale))
            .collect();
        surface.draw_path(&stroke);

        group.bench_with_input(BenchmarkId::from_parameter(canvas), &surface, |b, surface| {
            b.iter(|| black_box(rasterize(surface, 28)));
        });
    }

    group.finish();

    let coverage = DrawingSurface::square(280).unwrap().coverage();
    c.bench_function("area_resample_blank_280", |b| {
        b.iter(|| black_box(area_resample(coverage.view(), 28)));
    });
}

/// Benchmark batched forward passes at the default 28×28×26 shape
fn bench_forward(c: &mut Criterion) {
    let dataset = generate_glyph_dataset(6, 8, 28, 140, 1).unwrap();
    let (inputs, _) = dataset.as_tensors();
    let model = Classifier::new(&ClassifierConfig::new(28, 26)).unwrap();

    c.bench_function("predict_proba_batch_48", |b| {
        b.iter(|| black_box(model.predict_proba(&inputs).unwrap()));
    });
}

/// Benchmark one full-batch Adam step
fn bench_train_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("train_step");
    group.sample_size(20);

    for samples_per_class in [2usize, 8] {
        let dataset = generate_glyph_dataset(6, samples_per_class, 28, 140, 2).unwrap();
        let (inputs, targets) = dataset.as_tensors();
        let mut model = Classifier::new(&ClassifierConfig::new(28, 6)).unwrap();

        group.bench_function(BenchmarkId::from_parameter(dataset.len()), |b| {
            b.iter(|| black_box(model.train_step(&inputs, &targets).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rasterize, bench_forward, bench_train_step);
criterion_main!(benches);
