use face_averaging::analysis::RunSummary;
use face_averaging::config::{CanvasConfig, OutputConfig};
use face_averaging::data::{load_photo, DirectorySink, DirectorySource};
use face_averaging::pipeline::{AlignmentStage, FacePipeline, PhotoSource};
use face_averaging::AlignmentError;
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const FACE_LANDMARKS: &str = "30 40\n42 41\n58 41\n70 40\n50 75\n";

fn write_photo(dir: &Path, name: &str, landmarks: Option<&str>) {
    let image = RgbImage::from_fn(100, 120, |x, y| Rgb([(x * 2) as u8, (y * 2) as u8, 128]));
    let path = dir.join(name);
    image.save(&path).unwrap();
    if let Some(content) = landmarks {
        fs::write(path.with_extension("txt"), content).unwrap();
    }
}

#[test]
fn test_directory_source_skips_unusable_photos() {
    let dir = TempDir::new().unwrap();
    write_photo(dir.path(), "b_face.png", Some(FACE_LANDMARKS));
    write_photo(dir.path(), "a_short.png", Some("1 1\n2 2\n3 3\n"));
    write_photo(dir.path(), "c_bare.PNG", None);
    fs::write(dir.path().join("notes.md"), "not a photo").unwrap();

    let batch = DirectorySource::new(dir.path()).load().unwrap();

    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].label, "b_face.png");
    assert_eq!(batch.records[0].image.dimensions(), (100, 120));

    assert_eq!(batch.skipped.len(), 2);
    assert_eq!(batch.skipped[0].label, "a_short.png");
    assert_eq!(batch.skipped[0].stage, AlignmentStage::Load);
    assert_eq!(batch.skipped[0].index, None);
    assert_eq!(
        batch.skipped[0].error,
        AlignmentError::InsufficientLandmarks { found: 3 }
    );
    assert_eq!(batch.skipped[1].label, "c_bare.PNG");
    assert_eq!(
        batch.skipped[1].error,
        AlignmentError::InsufficientLandmarks { found: 0 }
    );
}

#[test]
fn test_load_photo_normalizes_pixels() {
    let dir = TempDir::new().unwrap();
    write_photo(dir.path(), "face.png", Some(FACE_LANDMARKS));

    let record = load_photo(dir.path().join("face.png")).unwrap();
    assert_eq!(record.landmarks.mouth.x, 50.0);
    let pixel = record.image.get_pixel(10, 0);
    assert!((pixel[0] - 20.0 / 255.0).abs() < 1e-6);
    assert!((pixel[2] - 128.0 / 255.0).abs() < 1e-6);
}

#[test]
fn test_load_photo_requires_landmarks() {
    let dir = TempDir::new().unwrap();
    write_photo(dir.path(), "face.png", None);
    assert!(load_photo(dir.path().join("face.png")).is_err());
}

#[test]
fn test_directory_round_trip_writes_outputs() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_photo(input.path(), "one.png", Some(FACE_LANDMARKS));
    write_photo(input.path(), "two.png", Some("28 44\n40 45\n57 44\n69 42\n47 80\n"));
    write_photo(input.path(), "three.png", Some("1 1\n"));

    let pipeline = FacePipeline::builder("round-trip")
        .canvas(CanvasConfig::new(60, 80))
        .build();
    let source = DirectorySource::new(input.path());
    let mut sink = DirectorySink::with_output_config(output.path(), &OutputConfig::default()).unwrap();

    let run = pipeline.run_with(&source, &mut sink).unwrap();
    assert_eq!(run.skipped.len(), 1);
    assert_eq!(run.composite.aligned.len(), 2);

    // Skipped photos never share an index with the loaded ones.
    let summary = RunSummary::from_run(&run);
    let indices: Vec<usize> = summary.photos.iter().map(|photo| photo.index).collect();
    assert_eq!(indices, vec![0, 1]);
    assert_eq!(summary.excluded.len(), 1);
    assert_eq!(summary.excluded[0].label, "three.png");
    assert_eq!(summary.excluded[0].index, None);

    for name in ["000.jpg", "001.jpg", "average.jpg"] {
        let path = output.path().join(name);
        assert!(path.is_file(), "missing {}", name);
        assert_eq!(image::open(&path).unwrap().to_rgb8().dimensions(), (60, 80));
    }
}

#[test]
fn test_missing_directory_is_an_error() {
    let dir = TempDir::new().unwrap();
    let source = DirectorySource::new(dir.path().join("nope"));
    assert!(source.load().is_err());
}
