use crate::pipeline::{DroppedPhoto, ImageBuffer, PhotoRecord};
use crate::Result;

/// Photos ready for alignment plus those rejected while loading.
#[derive(Debug, Clone, Default)]
pub struct LoadedBatch {
    pub records: Vec<PhotoRecord>,
    pub skipped: Vec<DroppedPhoto>,
}

/// Supplies annotated photos to the pipeline
pub trait PhotoSource {
    /// Human-readable description of where photos come from
    fn describe(&self) -> String;

    /// Load every eligible photo.
    ///
    /// Photos with too few landmarks are reported in `skipped`, not as errors.
    fn load(&self) -> Result<LoadedBatch>;
}

/// Receives the pipeline's output images
pub trait OutputSink {
    /// Accept one aligned photo; `index` is its position in the loaded batch.
    fn write_aligned(&mut self, index: usize, label: &str, image: &ImageBuffer) -> Result<()>;

    /// Accept the averaged composite
    fn write_average(&mut self, image: &ImageBuffer) -> Result<()>;
}

impl PhotoSource for Vec<PhotoRecord> {
    fn describe(&self) -> String {
        format!("{} in-memory photos", self.len())
    }

    fn load(&self) -> Result<LoadedBatch> {
        Ok(LoadedBatch {
            records: self.clone(),
            skipped: Vec::new(),
        })
    }
}

/// Sink that keeps every output in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub aligned: Vec<(usize, String, ImageBuffer)>,
    pub average: Option<ImageBuffer>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for MemorySink {
    fn write_aligned(&mut self, index: usize, label: &str, image: &ImageBuffer) -> Result<()> {
        self.aligned.push((index, label.to_string(), image.clone()));
        Ok(())
    }

    fn write_average(&mut self, image: &ImageBuffer) -> Result<()> {
        self.average = Some(image.clone());
        Ok(())
    }
}
