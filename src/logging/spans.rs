//! Structured spans for hierarchical logging
//!
//! Pre-defined spans for pipeline stages and per-photo work, so every record
//! carries the stage, the photo and the run's correlation id.

use crate::geometry::AffineTransform;
use std::time::Instant;
use tracing::{span, Level, Span};
use uuid::Uuid;

/// Span for a single photo passing through one alignment pass
pub struct PhotoSpan {
    span: Span,
    start_time: Instant,
}

impl PhotoSpan {
    /// Create a new span for photo `index` in `stage`.
    ///
    /// Rayon workers do not inherit the caller's current span, so the stage
    /// span is passed in explicitly as the parent.
    pub fn new(parent: &Span, stage: &str, index: usize, label: &str) -> Self {
        let span = span!(
            parent: parent,
            Level::DEBUG,
            "photo",
            stage = stage,
            photo_index = index,
            photo = label
        );

        Self {
            span,
            start_time: Instant::now(),
        }
    }

    /// Record a successfully estimated transform
    pub fn record_transform(&self, transform: &AffineTransform) {
        let params = transform.decompose();
        tracing::debug!(
            parent: &self.span,
            translation = format!("({:.2}, {:.2})", params.translation.0, params.translation.1),
            rotation = format!("{:.2}°", params.rotation_degrees),
            scale = format!("{:.3}x / {:.3}x", params.scale_x, params.scale_y),
            shear = format!("{:.4}", params.shear),
            elapsed_us = self.start_time.elapsed().as_micros() as u64,
            "Transform estimated"
        );
    }

    /// Record a failure that drops the photo from the run
    pub fn record_failure(&self, error: &dyn std::fmt::Display) {
        tracing::warn!(
            parent: &self.span,
            error = %error,
            "Photo dropped from alignment"
        );
    }

    /// Get the underlying span for manual instrumentation
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/// Span for pipeline stage execution
pub struct PipelineSpan {
    span: Span,
    start_time: Instant,
    stage_name: String,
}

impl PipelineSpan {
    /// Create a new pipeline stage span
    pub fn new(stage_name: &str, correlation_id: Option<Uuid>) -> Self {
        let span = if let Some(corr_id) = correlation_id {
            span!(
                Level::INFO,
                "pipeline_stage",
                stage = stage_name,
                correlation_id = %corr_id
            )
        } else {
            span!(Level::INFO, "pipeline_stage", stage = stage_name)
        };

        Self {
            span,
            start_time: Instant::now(),
            stage_name: stage_name.to_string(),
        }
    }

    /// Record how many photos entered the stage
    pub fn record_input(&self, photos: usize, canvas: Option<(u32, u32)>) {
        tracing::debug!(
            parent: &self.span,
            photos = photos,
            canvas_width = canvas.map(|(w, _)| w),
            canvas_height = canvas.map(|(_, h)| h),
            "Pipeline stage input recorded"
        );
    }

    /// Record stage completion
    pub fn record_completion(&self, succeeded: usize, dropped: usize) {
        let duration = self.start_time.elapsed();
        tracing::info!(
            parent: &self.span,
            stage = %self.stage_name,
            succeeded = succeeded,
            dropped = dropped,
            duration_ms = duration.as_secs_f64() * 1000.0,
            "Pipeline stage completed"
        );
    }

    /// Milliseconds since the span was created
    pub fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }

    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Get the underlying span for manual instrumentation
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_span_without_subscriber() {
        let span = PipelineSpan::new("pass1", Some(Uuid::new_v4()));
        let _guard = span.enter();
        span.record_input(3, Some((600, 800)));
        span.record_completion(3, 0);
        assert_eq!(span.stage_name(), "pass1");
        assert!(span.elapsed_ms() >= 0.0);
    }

    #[test]
    fn test_photo_span_records() {
        let stage = PipelineSpan::new("pass3", None);
        let span = PhotoSpan::new(stage.span(), "pass3", 2, "img_002");
        span.record_transform(&AffineTransform::identity());
        span.record_failure(&"source points are collinear");
    }
}
