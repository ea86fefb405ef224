use crate::config::CanvasConfig;
use crate::error::{AlignResult, AlignmentError};
use crate::geometry::{
    check_triangle, AffineEstimator, AffineTransform, LandmarkSet, Point2D, SimilarityEstimator,
    TransformEstimator,
};
use crate::logging::{global_metrics, PhotoSpan, PipelineSpan, Timer};
use crate::pipeline::{AlignedPhoto, AlignmentOutput, AlignmentStage, DroppedPhoto, PhotoRecord, StageTime};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Three-pass landmark alignment over a batch of photos.
///
/// 1. Similarity transform of each photo's pupils onto the canonical pupil
///    targets, applied to all five landmarks.
/// 2. Slot-wise mean of the pass 1 landmarks (a barrier over the batch).
/// 3. Similarity transform of pass 1 eyes and mouth onto the averaged ones.
/// 4. Exact affine transform of the original eyes and mouth onto the averaged
///    ones. This is the only transform applied to pixels.
///
/// Photos whose estimation fails are dropped and reported; they never
/// contribute to the average. A drop in pass 2 or 3 triggers a fresh average
/// over the remaining photos and a rerun of both passes.
#[derive(Clone)]
pub struct IterativeAligner {
    canvas: CanvasConfig,
    rigid: Arc<dyn TransformEstimator>,
    exact: Arc<dyn TransformEstimator>,
    correlation_id: Option<Uuid>,
}

impl IterativeAligner {
    pub fn new(canvas: CanvasConfig) -> Self {
        Self {
            canvas,
            rigid: Arc::new(SimilarityEstimator),
            exact: Arc::new(AffineEstimator),
            correlation_id: None,
        }
    }

    /// Replace the estimators used for passes 1-2 and pass 3.
    pub fn with_estimators(
        mut self,
        rigid: Arc<dyn TransformEstimator>,
        exact: Arc<dyn TransformEstimator>,
    ) -> Self {
        self.rigid = rigid;
        self.exact = exact;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn canvas(&self) -> &CanvasConfig {
        &self.canvas
    }

    pub fn pupil_targets(&self) -> [Point2D; 2] {
        self.canvas.pupil_targets()
    }

    pub fn align(&self, records: &[PhotoRecord]) -> AlignResult<AlignmentOutput> {
        if records.is_empty() {
            warn!("Refusing to align an empty batch");
            return Err(AlignmentError::EmptyBatch);
        }

        let pupil_targets = self.pupil_targets();
        let mut dropped = Vec::new();
        let mut timings = Vec::new();

        info!(
            photos = records.len(),
            rigid = self.rigid.name(),
            exact = self.exact.name(),
            left_pupil_target = %pupil_targets[0],
            right_pupil_target = %pupil_targets[1],
            "Starting alignment"
        );

        let inputs: Vec<(usize, ())> = (0..records.len()).map(|index| (index, ())).collect();
        let mut survivors: Vec<(usize, (AffineTransform, LandmarkSet))> = self
            .run_pass(AlignmentStage::Pass1, records, inputs, &mut dropped, &mut timings, |record, _| {
                // Pass 3 needs a non-degenerate original triangle.
                check_triangle(&record.landmarks.eyes_and_mouth(), "source")?;
                self.rigid.estimate(&record.landmarks.eyes(), &pupil_targets)
            })
            .into_iter()
            .map(|(index, (), initial)| (index, (initial, records[index].landmarks.map(&initial))))
            .collect();

        // A photo lost in pass 2 or 3 must not weigh on the average, so drop
        // it and re-average until both passes keep every survivor.
        let (averaged, photos) = loop {
            let averaged = self.average(&survivors, &mut timings).inspect_err(|_| {
                warn!(dropped = dropped.len(), "Every photo was dropped during alignment");
            })?;
            let target_triangle = averaged.eyes_and_mouth();
            let mut late = Vec::new();

            let pass2 = self.run_pass(AlignmentStage::Pass2, records, survivors.clone(), &mut late, &mut timings, |_, (_, initial_landmarks)| {
                self.rigid
                    .estimate(&initial_landmarks.eyes_and_mouth(), &target_triangle)
            });

            let inputs: Vec<(usize, (AffineTransform, LandmarkSet, AffineTransform))> = pass2
                .into_iter()
                .map(|(index, (initial, initial_landmarks), refined)| (index, (initial, initial_landmarks, refined)))
                .collect();
            let pass3 = self.run_pass(AlignmentStage::Pass3, records, inputs, &mut late, &mut timings, |record, _| {
                self.exact
                    .estimate(&record.landmarks.eyes_and_mouth(), &target_triangle)
            });

            if late.is_empty() {
                let photos: Vec<AlignedPhoto> = pass3
                    .into_iter()
                    .map(|(index, (initial, initial_landmarks, refined), final_transform)| AlignedPhoto {
                        index,
                        label: records[index].label.clone(),
                        landmarks: records[index].landmarks,
                        initial,
                        initial_landmarks,
                        refined,
                        final_transform,
                    })
                    .collect();
                break (averaged, photos);
            }

            warn!(
                dropped = late.len(),
                remaining = survivors.len() - late.len(),
                "Photos dropped after averaging, re-averaging without them"
            );
            survivors.retain(|(index, _)| late.iter().all(|photo| photo.index != Some(*index)));
            dropped.append(&mut late);
        };

        dropped.sort_by_key(|photo: &DroppedPhoto| photo.index);

        info!(
            aligned = photos.len(),
            dropped = dropped.len(),
            "Alignment completed"
        );

        Ok(AlignmentOutput {
            photos,
            averaged,
            pupil_targets,
            dropped,
            timings,
        })
    }

    /// Slot-wise mean of the surviving pass 1 landmark sets.
    fn average(
        &self,
        pass1: &[(usize, (AffineTransform, LandmarkSet))],
        timings: &mut Vec<StageTime>,
    ) -> AlignResult<LandmarkSet> {
        let stage_span = PipelineSpan::new("averaging", self.correlation_id);
        let _guard = stage_span.enter();
        stage_span.record_input(pass1.len(), None);

        let sets: Vec<LandmarkSet> = pass1.iter().map(|(_, (_, landmarks))| *landmarks).collect();
        let averaged = LandmarkSet::mean(&sets).ok_or_else(|| {
            tracing::debug!("No surviving photo, nothing to average");
            AlignmentError::EmptyBatch
        })?;

        tracing::debug!(
            left_pupil = %averaged.left_pupil,
            right_pupil = %averaged.right_pupil,
            mouth = %averaged.mouth,
            "Averaged landmarks"
        );
        stage_span.record_completion(sets.len(), 0);
        timings.push(StageTime {
            stage_name: "averaging".to_string(),
            duration_ms: stage_span.elapsed_ms(),
        });

        Ok(averaged)
    }

    /// Run one estimation pass over `inputs` in parallel.
    ///
    /// Each input is a photo index plus state carried from earlier passes.
    /// Failed photos move into `dropped`; the rest come back in input order
    /// with their new transform.
    fn run_pass<I, F>(
        &self,
        stage: AlignmentStage,
        records: &[PhotoRecord],
        inputs: Vec<(usize, I)>,
        dropped: &mut Vec<DroppedPhoto>,
        timings: &mut Vec<StageTime>,
        estimate: F,
    ) -> Vec<(usize, I, AffineTransform)>
    where
        I: Send,
        F: Fn(&PhotoRecord, &I) -> AlignResult<AffineTransform> + Sync,
    {
        let stage_span = PipelineSpan::new(stage.as_str(), self.correlation_id);
        let _guard = stage_span.enter();
        stage_span.record_input(inputs.len(), Some((self.canvas.width, self.canvas.height)));
        let timer = Timer::start_with_collector(stage.as_str(), self.correlation_id, global_metrics())
            .with_metadata("photos", serde_json::json!(inputs.len()));

        let results: Vec<(usize, I, AlignResult<AffineTransform>)> = inputs
            .into_par_iter()
            .map(|(index, carried)| {
                let record = &records[index];
                let photo_span = PhotoSpan::new(stage_span.span(), stage.as_str(), index, &record.label);
                let result = estimate(record, &carried);
                match &result {
                    Ok(transform) => photo_span.record_transform(transform),
                    Err(error) => photo_span.record_failure(error),
                }
                (index, carried, result)
            })
            .collect();

        let mut survivors = Vec::with_capacity(results.len());
        let mut failed = 0;
        for (index, carried, result) in results {
            match result {
                Ok(transform) => survivors.push((index, carried, transform)),
                Err(error) => {
                    failed += 1;
                    dropped.push(DroppedPhoto {
                        index: Some(index),
                        label: records[index].label.clone(),
                        stage,
                        error,
                    });
                }
            }
        }

        stage_span.record_completion(survivors.len(), failed);
        let duration = timer.stop();
        timings.push(StageTime {
            stage_name: stage.as_str().to_string(),
            duration_ms: duration.as_secs_f64() * 1000.0,
        });

        survivors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb32FImage;

    fn record(label: &str, points: [(f64, f64); 5]) -> PhotoRecord {
        PhotoRecord::new(
            label,
            LandmarkSet::new(points.map(Point2D::from)),
            Rgb32FImage::new(4, 4),
        )
    }

    fn face(dx: f64, dy: f64) -> PhotoRecord {
        record(
            "face",
            [
                (100.0 + dx, 120.0 + dy),
                (130.0 + dx, 122.0 + dy),
                (160.0 + dx, 122.0 + dy),
                (190.0 + dx, 120.0 + dy),
                (146.0 + dx, 210.0 + dy),
            ],
        )
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let aligner = IterativeAligner::new(CanvasConfig::default());
        assert_eq!(aligner.align(&[]).unwrap_err(), AlignmentError::EmptyBatch);
    }

    #[test]
    fn test_pass1_places_pupils_on_targets() {
        let aligner = IterativeAligner::new(CanvasConfig::default());
        let output = aligner.align(&[face(0.0, 0.0), face(35.0, -12.0)]).unwrap();
        let [left, right] = aligner.pupil_targets();
        for photo in &output.photos {
            assert!(photo.initial_landmarks.left_pupil.approx_eq(&left, 1e-9));
            assert!(photo.initial_landmarks.right_pupil.approx_eq(&right, 1e-9));
        }
        assert_eq!(output.timings.len(), 4);
    }

    #[test]
    fn test_coincident_pupils_are_dropped_at_pass1() {
        let aligner = IterativeAligner::new(CanvasConfig::default());
        let broken = record(
            "broken",
            [
                (50.0, 50.0),
                (60.0, 50.0),
                (70.0, 50.0),
                (50.0, 50.0),
                (60.0, 90.0),
            ],
        );
        let output = aligner.align(&[face(0.0, 0.0), broken]).unwrap();
        assert_eq!(output.photos.len(), 1);
        assert_eq!(output.dropped.len(), 1);
        assert_eq!(output.dropped[0].index, Some(1));
        assert_eq!(output.dropped[0].stage, AlignmentStage::Pass1);
        assert_eq!(output.averaged, output.photos[0].initial_landmarks);
    }

    /// Affine estimator that refuses any source whose first point has `x == reject_x`.
    struct RejectingEstimator {
        reject_x: f64,
    }

    impl TransformEstimator for RejectingEstimator {
        fn name(&self) -> &str {
            "rejecting"
        }

        fn estimate_triangles(
            &self,
            source: &[Point2D; 3],
            target: &[Point2D; 3],
        ) -> AlignResult<AffineTransform> {
            if source[0].x == self.reject_x {
                return Err(AlignmentError::degenerate("rejected"));
            }
            AffineEstimator.estimate_triangles(source, target)
        }
    }

    #[test]
    fn test_pass3_drop_reruns_without_the_photo() {
        let alone = IterativeAligner::new(CanvasConfig::default())
            .align(&[face(0.0, 0.0)])
            .unwrap();

        let aligner = IterativeAligner::new(CanvasConfig::default()).with_estimators(
            Arc::new(SimilarityEstimator),
            Arc::new(RejectingEstimator { reject_x: 135.0 }),
        );
        let output = aligner.align(&[face(0.0, 0.0), face(35.0, -12.0)]).unwrap();

        assert_eq!(output.photos.len(), 1);
        assert_eq!(output.photos[0].index, 0);
        assert_eq!(output.dropped.len(), 1);
        assert_eq!(output.dropped[0].index, Some(1));
        assert_eq!(output.dropped[0].stage, AlignmentStage::Pass3);
        assert_eq!(output.averaged, alone.averaged);
        // pass1, then averaging/pass2/pass3 twice
        assert_eq!(output.timings.len(), 7);
    }

    #[test]
    fn test_all_dropped_is_empty_batch() {
        let aligner = IterativeAligner::new(CanvasConfig::default());
        let broken = record("broken", [(10.0, 10.0); 5]);
        assert_eq!(
            aligner.align(&[broken]).unwrap_err(),
            AlignmentError::EmptyBatch
        );
    }
}
