use crate::config::OutputConfig;
use crate::pipeline::{ImageBuffer, OutputSink};
use anyhow::Context;
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Convert normalized RGB to 8-bit, clamping out-of-range samples.
pub fn to_rgb8(image: &ImageBuffer) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y);
        Rgb(pixel.0.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
    })
}

pub fn save_image<P: AsRef<Path>>(image: &ImageBuffer, path: P) -> crate::Result<()> {
    let path = path.as_ref();
    to_rgb8(image)
        .save(path)
        .with_context(|| format!("Failed to write image {}", path.display()))
}

/// Writes aligned photos as `NNN.<ext>` and the average under its own name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    extension: String,
    average_file_name: String,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    /// Create the sink, creating `dir` if needed.
    pub fn new<P: Into<PathBuf>>(dir: P) -> crate::Result<Self> {
        Self::with_output_config(dir, &OutputConfig::default())
    }

    pub fn with_output_config<P: Into<PathBuf>>(dir: P, output: &OutputConfig) -> crate::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        Ok(Self {
            dir,
            extension: output.aligned_extension.clone(),
            average_file_name: output.average_file_name.clone(),
            written: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn aligned_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{:03}.{}", index, self.extension))
    }

    pub fn average_path(&self) -> PathBuf {
        self.dir.join(&self.average_file_name)
    }

    /// Every file written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl OutputSink for DirectorySink {
    fn write_aligned(&mut self, index: usize, label: &str, image: &ImageBuffer) -> crate::Result<()> {
        let path = self.aligned_path(index);
        save_image(image, &path)?;
        debug!(photo = %label, path = %path.display(), "Wrote aligned photo");
        self.written.push(path);
        Ok(())
    }

    fn write_average(&mut self, image: &ImageBuffer) -> crate::Result<()> {
        let path = self.average_path();
        save_image(image, &path)?;
        info!(path = %path.display(), "Wrote average face");
        self.written.push(path);
        Ok(())
    }
}
