//! Synthetic batches for validating alignment against a known answer.
//!
//! Each copy of a base photo is rotated, scaled and translated by a random
//! similarity transform, applied to pixels and landmarks together. A correct
//! pipeline undoes the perturbations, so every copy's landmarks land on the
//! averaged ones.

use crate::config::ValidationConfig;
use crate::error::AlignResult;
use crate::geometry::{AffineTransform, Point2D};
use crate::pipeline::{warp_affine, PhotoRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The random perturbation applied to one copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Perturbation {
    pub rotation_degrees: f64,
    pub scale: f64,
    pub translation: (f64, f64),
}

impl Perturbation {
    /// Rotate and scale about `center`, then translate.
    pub fn to_transform(&self, center: Point2D) -> AffineTransform {
        AffineTransform::similarity_about(center, self.rotation_degrees, self.scale).then(
            &AffineTransform::translation(self.translation.0, self.translation.1),
        )
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticPhoto {
    pub record: PhotoRecord,
    pub perturbation: Perturbation,
    /// Maps base photo coordinates to this copy's coordinates.
    pub ground_truth: AffineTransform,
}

#[derive(Debug, Clone)]
pub struct SyntheticBatch {
    pub base_label: String,
    pub seed: u64,
    pub photos: Vec<SyntheticPhoto>,
}

impl SyntheticBatch {
    /// Perturbed copies of `base`, reproducible for a given seed.
    pub fn generate(base: &PhotoRecord, config: &ValidationConfig) -> AlignResult<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let (width, height) = base.image.dimensions();
        let center = Point2D::new(width as f64 / 2.0, height as f64 / 2.0);

        let mut photos = Vec::with_capacity(config.photo_count as usize);
        for i in 0..config.photo_count {
            let perturbation = Perturbation {
                rotation_degrees: rng.gen_range(
                    config.rotation_range_degrees.0..=config.rotation_range_degrees.1,
                ),
                scale: rng.gen_range(config.scale_range.0..=config.scale_range.1),
                translation: (
                    rng.gen_range(config.translation_range.0..=config.translation_range.1),
                    rng.gen_range(config.translation_range.0..=config.translation_range.1),
                ),
            };
            let ground_truth = perturbation.to_transform(center);

            debug!(
                copy = i,
                rotation = perturbation.rotation_degrees,
                scale = perturbation.scale,
                tx = perturbation.translation.0,
                ty = perturbation.translation.1,
                "Generated synthetic perturbation"
            );

            let image = warp_affine(&base.image, &ground_truth, width, height)?;
            let record = PhotoRecord::new(
                format!("{}#{:03}", base.label, i),
                base.landmarks.map(&ground_truth),
                image,
            );
            photos.push(SyntheticPhoto {
                record,
                perturbation,
                ground_truth,
            });
        }

        Ok(Self {
            base_label: base.label.clone(),
            seed: config.seed,
            photos,
        })
    }

    pub fn records(&self) -> Vec<PhotoRecord> {
        self.photos.iter().map(|photo| photo.record.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }
}
