use crate::geometry::{AffineTransform, LandmarkSet, TransformParams, LANDMARK_COUNT};
use crate::pipeline::{AlignmentStage, PipelineRun, StageTime};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Distance of each transformed landmark from its averaged counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkResiduals {
    pub per_landmark: [f64; LANDMARK_COUNT],
    pub mean: f64,
    pub max: f64,
}

pub fn landmark_residuals(
    original: &LandmarkSet,
    transform: &AffineTransform,
    averaged: &LandmarkSet,
) -> LandmarkResiduals {
    let mapped = original.map(transform).points();
    let targets = averaged.points();
    let per_landmark: [f64; LANDMARK_COUNT] =
        std::array::from_fn(|i| mapped[i].distance(&targets[i]));

    LandmarkResiduals {
        per_landmark,
        mean: per_landmark.iter().sum::<f64>() / LANDMARK_COUNT as f64,
        max: per_landmark.iter().cloned().fold(0.0, f64::max),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoSummary {
    pub index: usize,
    pub label: String,
    pub transform: AffineTransform,
    pub params: TransformParams,
    pub residuals: LandmarkResiduals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedSummary {
    /// `None` for photos skipped while loading.
    pub index: Option<usize>,
    pub label: String,
    pub stage: AlignmentStage,
    pub reason: String,
}

/// Serializable account of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub correlation_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub canvas: (u32, u32),
    pub averaged_landmarks: LandmarkSet,
    pub photos: Vec<PhotoSummary>,
    pub excluded: Vec<ExcludedSummary>,
    pub stage_timings: Vec<StageTime>,
    pub mean_residual_px: f64,
    pub max_residual_px: f64,
}

impl RunSummary {
    pub fn from_run(run: &PipelineRun) -> Self {
        let averaged = run.alignment.averaged;
        let photos: Vec<PhotoSummary> = run
            .alignment
            .photos
            .iter()
            .filter(|photo| {
                run.composite
                    .dropped
                    .iter()
                    .all(|dropped| dropped.index != Some(photo.index))
            })
            .map(|photo| PhotoSummary {
                index: photo.index,
                label: photo.label.clone(),
                transform: photo.final_transform,
                params: photo.final_transform.decompose(),
                residuals: landmark_residuals(&photo.landmarks, &photo.final_transform, &averaged),
            })
            .collect();

        let excluded = run
            .excluded()
            .map(|dropped| ExcludedSummary {
                index: dropped.index,
                label: dropped.label.clone(),
                stage: dropped.stage,
                reason: dropped.error.to_string(),
            })
            .collect();

        let mean_residual_px = if photos.is_empty() {
            0.0
        } else {
            photos.iter().map(|p| p.residuals.mean).sum::<f64>() / photos.len() as f64
        };
        let max_residual_px = photos
            .iter()
            .map(|p| p.residuals.max)
            .fold(0.0, f64::max);

        let (width, height) = run.composite.average.dimensions();

        Self {
            correlation_id: run.correlation_id,
            generated_at: Utc::now(),
            canvas: (width, height),
            averaged_landmarks: averaged,
            photos,
            excluded,
            stage_timings: run.stage_timings.clone(),
            mean_residual_px,
            max_residual_px,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2D;

    fn landmarks(offset: f64) -> LandmarkSet {
        LandmarkSet::new(
            [
                (10.0, 10.0),
                (20.0, 11.0),
                (30.0, 11.0),
                (40.0, 10.0),
                (25.0, 40.0),
            ]
            .map(|(x, y)| Point2D::new(x + offset, y)),
        )
    }

    #[test]
    fn test_residuals_zero_for_exact_transform() {
        let residuals = landmark_residuals(
            &landmarks(0.0),
            &AffineTransform::translation(5.0, 0.0),
            &landmarks(5.0),
        );
        assert!(residuals.max < 1e-12);
        assert!(residuals.mean < 1e-12);
    }

    #[test]
    fn test_residuals_measure_offset() {
        let residuals = landmark_residuals(
            &landmarks(0.0),
            &AffineTransform::identity(),
            &landmarks(3.0),
        );
        assert!(residuals.per_landmark.iter().all(|d| (d - 3.0).abs() < 1e-12));
        assert!((residuals.mean - 3.0).abs() < 1e-12);
        assert!((residuals.max - 3.0).abs() < 1e-12);
    }
}
