use crate::error::AlignmentError;
use crate::geometry::{AffineTransform, LandmarkSet, Point2D};
use image::Rgb32FImage;
use serde::{Deserialize, Serialize};

/// RGB image with `f32` samples normalized to [0, 1].
pub type ImageBuffer = Rgb32FImage;

/// One annotated photo taking part in an alignment run.
#[derive(Debug, Clone)]
pub struct PhotoRecord {
    pub label: String,
    pub landmarks: LandmarkSet,
    pub image: ImageBuffer,
}

impl PhotoRecord {
    pub fn new(label: impl Into<String>, landmarks: LandmarkSet, image: ImageBuffer) -> Self {
        Self {
            label: label.into(),
            landmarks,
            image,
        }
    }
}

/// Stage of the run at which a photo was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStage {
    Load,
    Pass1,
    Pass2,
    Pass3,
    Composite,
}

impl AlignmentStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Pass1 => "pass1",
            Self::Pass2 => "pass2",
            Self::Pass3 => "pass3",
            Self::Composite => "composite",
        }
    }
}

impl std::fmt::Display for AlignmentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A photo excluded from the run, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedPhoto {
    /// Position among the loaded records, as for [`AlignedPhoto::index`].
    /// `None` for photos skipped before they were loaded.
    pub index: Option<usize>,
    pub label: String,
    pub stage: AlignmentStage,
    pub error: AlignmentError,
}

/// Per-photo transforms produced by the aligner.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPhoto {
    /// Position of the photo in the aligner's input.
    pub index: usize,
    pub label: String,
    /// Landmarks as annotated on the source photo.
    pub landmarks: LandmarkSet,
    /// Pass 1: eyes onto the canonical pupil targets.
    pub initial: AffineTransform,
    /// Landmarks after the pass 1 transform.
    pub initial_landmarks: LandmarkSet,
    /// Pass 2: pass 1 landmarks onto the averaged eyes and mouth.
    pub refined: AffineTransform,
    /// Pass 3: original landmarks straight onto the averaged eyes and mouth.
    pub final_transform: AffineTransform,
}

/// Result of the three-pass alignment.
#[derive(Debug, Clone)]
pub struct AlignmentOutput {
    pub photos: Vec<AlignedPhoto>,
    pub averaged: LandmarkSet,
    pub pupil_targets: [Point2D; 2],
    pub dropped: Vec<DroppedPhoto>,
    pub timings: Vec<StageTime>,
}

impl AlignmentOutput {
    pub fn final_transforms(&self) -> Vec<(usize, AffineTransform)> {
        self.photos
            .iter()
            .map(|photo| (photo.index, photo.final_transform))
            .collect()
    }
}

/// Warped photos and their average.
#[derive(Debug, Clone)]
pub struct CompositeOutput {
    pub aligned: Vec<(usize, ImageBuffer)>,
    pub average: ImageBuffer,
    /// Photos whose warp failed; they are left out of the average.
    pub dropped: Vec<DroppedPhoto>,
    pub timing: StageTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTime {
    pub stage_name: String,
    pub duration_ms: f64,
}
