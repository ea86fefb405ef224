use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use face_averaging::config::{CanvasConfig, ValidationConfig};
use face_averaging::data::SyntheticBatch;
use face_averaging::geometry::{LandmarkSet, Point2D};
use face_averaging::pipeline::{FacePipeline, IterativeAligner, PhotoRecord};
use image::{Rgb, Rgb32FImage};
use std::hint::black_box;

fn base_photo() -> PhotoRecord {
    let landmarks = LandmarkSet::new(
        [
            (210.0, 300.0),
            (260.0, 304.0),
            (340.0, 304.0),
            (390.0, 300.0),
            (300.0, 520.0),
        ]
        .map(Point2D::from),
    );
    let image = Rgb32FImage::from_fn(600, 800, |x, y| {
        Rgb([x as f32 / 600.0, y as f32 / 800.0, ((x ^ y) & 0xff) as f32 / 255.0])
    });
    PhotoRecord::new("bench", landmarks, image)
}

fn batch(count: u32) -> Vec<PhotoRecord> {
    let config = ValidationConfig {
        photo_count: count,
        ..ValidationConfig::default()
    };
    SyntheticBatch::generate(&base_photo(), &config)
        .expect("synthetic batch")
        .records()
}

fn pipeline_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    let pipeline = FacePipeline::builder("bench").build();
    for count in [4u32, 16] {
        let records = batch(count);
        group.bench_with_input(BenchmarkId::new("run", count), &records, |b, records| {
            b.iter(|| pipeline.run(black_box(records)).expect("pipeline run"))
        });
    }
    group.finish();

    let aligner = IterativeAligner::new(CanvasConfig::default());
    let records = batch(64);
    c.bench_function("align_only_64", |b| {
        b.iter(|| aligner.align(black_box(&records)).expect("alignment"))
    });
}

criterion_group!(benches, pipeline_benchmarks);
criterion_main!(benches);
