//! Face averaging: align annotated face photos on their eyes and mouth and
//! blend them into one composite.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod pipeline;
pub mod visualization;

pub use config::{CanvasConfig, Config};
pub use error::{AlignResult, AlignmentError};
pub use geometry::{AffineTransform, LandmarkSet, Point2D};
pub use pipeline::{
    composite, FacePipeline, FacePipelineBuilder, ImageBuffer, IterativeAligner, PhotoRecord,
    PipelineRun,
};

pub type Result<T> = anyhow::Result<T>;
