use thiserror::Error;

/// Failures raised by the alignment core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("insufficient landmarks: expected 5 points, found {found}")]
    InsufficientLandmarks { found: usize },

    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry { reason: String },

    #[error("empty batch: no eligible photos to align")]
    EmptyBatch,

    #[error("no photo at index {index}")]
    UnknownPhoto { index: usize },

    #[error("correspondence mismatch: {source_len} source points vs {target_len} target points (expected 2 or 3 on each side)")]
    CorrespondenceMismatch { source_len: usize, target_len: usize },
}

impl AlignmentError {
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateGeometry {
            reason: reason.into(),
        }
    }

    /// True for errors that only invalidate a single photo.
    pub fn is_per_photo(&self) -> bool {
        matches!(
            self,
            Self::InsufficientLandmarks { .. } | Self::DegenerateGeometry { .. }
        )
    }
}

pub type AlignResult<T> = std::result::Result<T, AlignmentError>;
