use crate::config::CanvasConfig;
use crate::error::{AlignResult, AlignmentError};
use crate::geometry::{AffineTransform, Point2D};
use crate::logging::{global_metrics, PhotoSpan, PipelineSpan, Timer};
use crate::pipeline::{AlignmentStage, CompositeOutput, DroppedPhoto, ImageBuffer, PhotoRecord, StageTime};
use image::Rgb;
use ndarray::Array3;
use rayon::prelude::*;
use tracing::warn;
use uuid::Uuid;

/// Warps photos onto the canvas and averages them.
pub struct Compositor {
    width: u32,
    height: u32,
    correlation_id: Option<Uuid>,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            correlation_id: None,
        }
    }

    pub fn from_canvas(canvas: &CanvasConfig) -> Self {
        Self::new(canvas.width, canvas.height)
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Warp `records[index]` by its transform for every `(index, transform)`
    /// pair and average the results.
    ///
    /// A photo whose transform cannot be inverted is dropped with
    /// [`AlignmentStage::Composite`]. Each remaining warp is weighted by
    /// `1 / aligned.len()`; per-thread partial sums are merged at the end,
    /// so no accumulator is shared between workers.
    pub fn composite(
        &self,
        records: &[PhotoRecord],
        transforms: &[(usize, AffineTransform)],
    ) -> AlignResult<CompositeOutput> {
        if transforms.is_empty() {
            return Err(AlignmentError::EmptyBatch);
        }

        let stage_span = PipelineSpan::new("composite", self.correlation_id);
        let _guard = stage_span.enter();
        stage_span.record_input(transforms.len(), Some((self.width, self.height)));
        let timer = Timer::start_with_collector("composite", self.correlation_id, global_metrics())
            .with_metadata("photos", serde_json::json!(transforms.len()));

        let warps: Vec<(usize, AlignResult<ImageBuffer>)> = transforms
            .par_iter()
            .map(|&(index, transform)| -> AlignResult<(usize, AlignResult<ImageBuffer>)> {
                let record = records
                    .get(index)
                    .ok_or(AlignmentError::UnknownPhoto { index })?;
                let photo_span = PhotoSpan::new(stage_span.span(), "composite", index, &record.label);
                let warped = warp_affine(&record.image, &transform, self.width, self.height);
                match &warped {
                    Ok(_) => photo_span.record_transform(&transform),
                    Err(error) => photo_span.record_failure(error),
                }
                Ok((index, warped))
            })
            .collect::<AlignResult<_>>()?;

        let mut aligned = Vec::with_capacity(warps.len());
        let mut dropped = Vec::new();
        for (index, warped) in warps {
            match warped {
                Ok(image) => aligned.push((index, image)),
                Err(error) => dropped.push(DroppedPhoto {
                    index: Some(index),
                    label: records[index].label.clone(),
                    stage: AlignmentStage::Composite,
                    error,
                }),
            }
        }

        if aligned.is_empty() {
            warn!(dropped = dropped.len(), "No photo could be warped");
            return Err(AlignmentError::EmptyBatch);
        }

        let shape = (self.height as usize, self.width as usize, 3);
        let weight = 1.0 / aligned.len() as f32;
        let sum = aligned
            .par_iter()
            .fold(
                || Array3::<f32>::zeros(shape),
                |mut acc, (_, image)| {
                    // Both buffers are row-major with interleaved RGB samples.
                    for (total, sample) in acc.iter_mut().zip(image.as_raw()) {
                        *total += sample * weight;
                    }
                    acc
                },
            )
            .reduce(
                || Array3::<f32>::zeros(shape),
                |mut a, b| {
                    a += &b;
                    a
                },
            );

        let average = ImageBuffer::from_fn(self.width, self.height, |x, y| {
            let (x, y) = (x as usize, y as usize);
            Rgb([0, 1, 2].map(|c| sum[[y, x, c]].clamp(0.0, 1.0)))
        });

        stage_span.record_completion(aligned.len(), dropped.len());
        let duration = timer.stop();

        Ok(CompositeOutput {
            aligned,
            average,
            dropped,
            timing: StageTime {
                stage_name: AlignmentStage::Composite.as_str().to_string(),
                duration_ms: duration.as_secs_f64() * 1000.0,
            },
        })
    }
}

/// Free-function form of [`Compositor::composite`].
pub fn composite(
    records: &[PhotoRecord],
    transforms: &[(usize, AffineTransform)],
    canvas_width: u32,
    canvas_height: u32,
) -> AlignResult<CompositeOutput> {
    Compositor::new(canvas_width, canvas_height).composite(records, transforms)
}

/// Warp `image` by `transform` onto a new `width` x `height` buffer.
///
/// Every destination pixel is mapped back through the inverse transform and
/// sampled bilinearly; destinations that fall outside the source are black.
pub fn warp_affine(
    image: &ImageBuffer,
    transform: &AffineTransform,
    width: u32,
    height: u32,
) -> AlignResult<ImageBuffer> {
    let inverse = transform.inverse()?;

    Ok(ImageBuffer::from_fn(width, height, |x, y| {
        let source = inverse.apply(Point2D::new(x as f64, y as f64));
        bilinear_interpolate(image, source.x as f32, source.y as f32)
    }))
}

/// Bilinear interpolation for smooth transformations
pub fn bilinear_interpolate(image: &ImageBuffer, x: f32, y: f32) -> Rgb<f32> {
    let width = image.width();
    let height = image.height();

    if !(x >= 0.0 && y >= 0.0 && x < width as f32 && y < height as f32) {
        return Rgb([0.0, 0.0, 0.0]);
    }

    let x1 = (x.floor() as u32).min(width - 1);
    let y1 = (y.floor() as u32).min(height - 1);
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);

    let fx = x - x1 as f32;
    let fy = y - y1 as f32;

    let p11 = image.get_pixel(x1, y1);
    let p12 = image.get_pixel(x1, y2);
    let p21 = image.get_pixel(x2, y1);
    let p22 = image.get_pixel(x2, y2);

    Rgb([0, 1, 2].map(|c| {
        p11[c] * (1.0 - fx) * (1.0 - fy)
            + p21[c] * fx * (1.0 - fy)
            + p12[c] * (1.0 - fx) * fy
            + p22[c] * fx * fy
    }))
}
