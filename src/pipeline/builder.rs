use crate::config::CanvasConfig;
use crate::error::AlignResult;
use crate::geometry::TransformEstimator;
use crate::logging::{get_correlation_id, new_correlation_id};
use crate::pipeline::{
    AlignmentOutput, CompositeOutput, Compositor, DroppedPhoto, IterativeAligner, OutputSink,
    PhotoRecord, PhotoSource, StageTime,
};
use crate::Result;
use anyhow::Context;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Builder for face averaging pipelines
pub struct FacePipelineBuilder {
    name: String,
    canvas: CanvasConfig,
    estimators: Option<(Arc<dyn TransformEstimator>, Arc<dyn TransformEstimator>)>,
    write_aligned: bool,
}

impl FacePipelineBuilder {
    /// Create a new pipeline builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            canvas: CanvasConfig::default(),
            estimators: None,
            write_aligned: true,
        }
    }

    pub fn canvas(mut self, canvas: CanvasConfig) -> Self {
        self.canvas = canvas;
        self
    }

    /// Override the rigid (passes 1-2) and exact (pass 3) estimators
    pub fn estimators(
        mut self,
        rigid: Arc<dyn TransformEstimator>,
        exact: Arc<dyn TransformEstimator>,
    ) -> Self {
        self.estimators = Some((rigid, exact));
        self
    }

    /// Whether [`FacePipeline::run_with`] hands each aligned photo to the sink
    pub fn write_aligned(mut self, write_aligned: bool) -> Self {
        self.write_aligned = write_aligned;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> FacePipeline {
        let mut aligner = IterativeAligner::new(self.canvas);
        if let Some((rigid, exact)) = self.estimators {
            aligner = aligner.with_estimators(rigid, exact);
        }

        FacePipeline {
            name: self.name,
            aligner,
            write_aligned: self.write_aligned,
        }
    }
}

/// Everything produced by one pipeline execution.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub correlation_id: Uuid,
    pub alignment: AlignmentOutput,
    pub composite: CompositeOutput,
    /// Photos rejected by the source before alignment.
    pub skipped: Vec<DroppedPhoto>,
    pub stage_timings: Vec<StageTime>,
}

impl PipelineRun {
    pub fn total_duration_ms(&self) -> f64 {
        self.stage_timings.iter().map(|t| t.duration_ms).sum()
    }

    /// Skipped and dropped photos together.
    pub fn excluded(&self) -> impl Iterator<Item = &DroppedPhoto> {
        self.skipped
            .iter()
            .chain(self.alignment.dropped.iter())
            .chain(self.composite.dropped.iter())
    }
}

/// Align, then composite: the full face averaging run
pub struct FacePipeline {
    name: String,
    aligner: IterativeAligner,
    write_aligned: bool,
}

impl FacePipeline {
    pub fn builder(name: impl Into<String>) -> FacePipelineBuilder {
        FacePipelineBuilder::new(name)
    }

    /// Run alignment and compositing over in-memory records.
    pub fn run(&self, records: &[PhotoRecord]) -> AlignResult<PipelineRun> {
        // Ensure we have a correlation ID for this pipeline execution
        let correlation_id = get_correlation_id().unwrap_or_else(new_correlation_id);
        let canvas = *self.aligner.canvas();

        info!(
            pipeline = %self.name,
            photos = records.len(),
            canvas_width = canvas.width,
            canvas_height = canvas.height,
            correlation_id = %correlation_id,
            "Starting pipeline execution"
        );

        let aligner = self.aligner.clone().with_correlation_id(correlation_id);
        let alignment = aligner.align(records).inspect_err(|e| {
            error!(pipeline = %self.name, error = %e, "Alignment failed");
        })?;

        let composite = Compositor::from_canvas(&canvas)
            .with_correlation_id(correlation_id)
            .composite(records, &alignment.final_transforms())
            .inspect_err(|e| {
                error!(pipeline = %self.name, error = %e, "Compositing failed");
            })?;

        let mut stage_timings = alignment.timings.clone();
        stage_timings.push(composite.timing.clone());

        let run = PipelineRun {
            correlation_id,
            alignment,
            composite,
            skipped: Vec::new(),
            stage_timings,
        };

        info!(
            pipeline = %self.name,
            total_duration_ms = run.total_duration_ms(),
            stages_executed = run.stage_timings.len(),
            aligned = run.composite.aligned.len(),
            dropped = run.alignment.dropped.len() + run.composite.dropped.len(),
            correlation_id = %correlation_id,
            "Pipeline execution completed successfully"
        );

        Ok(run)
    }

    /// Load from `source`, run, and deliver the images to `sink`.
    pub fn run_with(
        &self,
        source: &dyn PhotoSource,
        sink: &mut dyn OutputSink,
    ) -> Result<PipelineRun> {
        debug!(pipeline = %self.name, source = %source.describe(), "Loading photos");
        let batch = source
            .load()
            .with_context(|| format!("Failed to load photos from {}", source.describe()))?;

        for skipped in &batch.skipped {
            warn!(
                photo = %skipped.label,
                error = %skipped.error,
                "Photo skipped while loading"
            );
        }

        let mut run = self
            .run(&batch.records)
            .with_context(|| format!("Pipeline '{}' failed", self.name))?;
        run.skipped = batch.skipped;

        if self.write_aligned {
            for (index, image) in &run.composite.aligned {
                let label = &batch.records[*index].label;
                sink.write_aligned(*index, label, image)
                    .with_context(|| format!("Failed to write aligned photo {}", label))?;
            }
        }
        sink.write_average(&run.composite.average)
            .context("Failed to write average image")?;

        Ok(run)
    }

    /// Get pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn canvas(&self) -> &CanvasConfig {
        self.aligner.canvas()
    }
}
