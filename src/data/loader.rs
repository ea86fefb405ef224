use crate::geometry::{LandmarkSet, Point2D};
use crate::pipeline::{AlignmentStage, DroppedPhoto, ImageBuffer, LoadedBatch, PhotoRecord, PhotoSource};
use anyhow::{anyhow, Context};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Read landmark coordinates, one `x y` pair per line.
///
/// Only the first two whitespace-separated tokens of a line are used; blank
/// lines are skipped.
pub fn load_landmarks<P: AsRef<Path>>(path: P) -> crate::Result<Vec<Point2D>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read landmarks from {}", path.display()))?;

    let mut points = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        let Some(x) = tokens.next() else {
            continue;
        };
        let y = tokens.next().ok_or_else(|| {
            anyhow!("{}:{}: expected two coordinates", path.display(), line_no + 1)
        })?;

        let parse = |token: &str| {
            token.parse::<f64>().with_context(|| {
                format!("{}:{}: invalid coordinate '{}'", path.display(), line_no + 1, token)
            })
        };
        points.push(Point2D::new(parse(x)?, parse(y)?));
    }

    Ok(points)
}

/// The landmark file that sits next to `image_path`.
pub fn landmarks_path_for<P: AsRef<Path>>(image_path: P) -> PathBuf {
    image_path.as_ref().with_extension("txt")
}

/// Decode an image into normalized RGB.
pub fn load_image<P: AsRef<Path>>(path: P) -> crate::Result<ImageBuffer> {
    let path = path.as_ref();
    let img = image::open(path)
        .with_context(|| format!("Failed to decode image {}", path.display()))?;
    Ok(img.to_rgb32f())
}

/// Load an image together with its landmark file.
pub fn load_photo<P: AsRef<Path>>(image_path: P) -> crate::Result<PhotoRecord> {
    let image_path = image_path.as_ref();
    let points = load_landmarks(landmarks_path_for(image_path))?;
    let landmarks = LandmarkSet::from_points(&points)
        .with_context(|| format!("Unusable landmarks for {}", image_path.display()))?;
    Ok(PhotoRecord::new(
        photo_label(image_path),
        landmarks,
        load_image(image_path)?,
    ))
}

fn photo_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Annotated photos from a directory.
///
/// Every `*.jpg`, `*.jpeg` or `*.png` file (any case) is a candidate; its
/// landmarks come from the `.txt` file with the same stem.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Candidate image paths sorted by file name.
    pub fn image_paths(&self) -> crate::Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read directory {}", self.dir.display()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_image_file(&path) {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }
}

impl PhotoSource for DirectorySource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn load(&self) -> crate::Result<LoadedBatch> {
        let mut batch = LoadedBatch::default();

        for image_path in self.image_paths()? {
            let label = photo_label(&image_path);
            let landmarks_path = landmarks_path_for(&image_path);

            let points = if landmarks_path.is_file() {
                load_landmarks(&landmarks_path)?
            } else {
                Vec::new()
            };

            let landmarks = match LandmarkSet::from_points(&points) {
                Ok(landmarks) => landmarks,
                Err(error) => {
                    warn!(photo = %label, error = %error, "Skipping photo");
                    batch.skipped.push(DroppedPhoto {
                        index: None,
                        label,
                        stage: AlignmentStage::Load,
                        error,
                    });
                    continue;
                }
            };

            debug!(photo = %label, "Loading photo");
            let image = load_image(&image_path)?;
            batch.records.push(PhotoRecord::new(label, landmarks, image));
        }

        info!(
            dir = %self.dir.display(),
            loaded = batch.records.len(),
            skipped = batch.skipped.len(),
            "Loaded photo directory"
        );

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_landmarks_ignores_extra_tokens_and_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "a.txt", "1 2\n\n3.5 4 extra\n  \n5 6\n");
        let points = load_landmarks(&path).unwrap();
        assert_eq!(
            points,
            vec![
                Point2D::new(1.0, 2.0),
                Point2D::new(3.5, 4.0),
                Point2D::new(5.0, 6.0)
            ]
        );
    }

    #[test]
    fn test_load_landmarks_rejects_malformed_numbers() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "bad.txt", "1 2\nx 4\n");
        assert!(load_landmarks(&path).is_err());

        let path = write_file(dir.path(), "short.txt", "1\n");
        assert!(load_landmarks(&path).is_err());
    }

    #[test]
    fn test_landmarks_path_for() {
        assert_eq!(
            landmarks_path_for("faces/anna.JPG"),
            PathBuf::from("faces/anna.txt")
        );
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a.JPG")));
        assert!(is_image_file(Path::new("a.jpeg")));
        assert!(is_image_file(Path::new("a.png")));
        assert!(!is_image_file(Path::new("a.txt")));
        assert!(!is_image_file(Path::new("jpg")));
    }
}
