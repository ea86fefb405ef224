use super::{AffineTransform, Point2D};
use crate::error::{AlignResult, AlignmentError};
use serde::{Deserialize, Serialize};

/// Number of landmark points captured per photo.
pub const LANDMARK_COUNT: usize = 5;

/// The five facial landmarks of one photo.
///
/// Left and right are from the camera's point of view. The slot order used
/// by landmark files is: left pupil, left tear duct, right tear duct, right
/// pupil, mouth center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub left_pupil: Point2D,
    pub left_tear_duct: Point2D,
    pub right_tear_duct: Point2D,
    pub right_pupil: Point2D,
    pub mouth: Point2D,
}

/// Names of the landmark slots, in file order.
pub const LANDMARK_NAMES: [&str; LANDMARK_COUNT] = [
    "left_pupil",
    "left_tear_duct",
    "right_tear_duct",
    "right_pupil",
    "mouth",
];

impl LandmarkSet {
    pub fn new(points: [Point2D; LANDMARK_COUNT]) -> Self {
        let [left_pupil, left_tear_duct, right_tear_duct, right_pupil, mouth] = points;
        Self {
            left_pupil,
            left_tear_duct,
            right_tear_duct,
            right_pupil,
            mouth,
        }
    }

    /// Build from points in file order. Points past the fifth are ignored.
    pub fn from_points(points: &[Point2D]) -> AlignResult<Self> {
        if points.len() < LANDMARK_COUNT {
            return Err(AlignmentError::InsufficientLandmarks {
                found: points.len(),
            });
        }
        if points.len() > LANDMARK_COUNT {
            tracing::debug!(
                found = points.len(),
                "Ignoring landmark points beyond the fifth"
            );
        }

        Ok(Self::new([
            points[0], points[1], points[2], points[3], points[4],
        ]))
    }

    pub fn points(&self) -> [Point2D; LANDMARK_COUNT] {
        [
            self.left_pupil,
            self.left_tear_duct,
            self.right_tear_duct,
            self.right_pupil,
            self.mouth,
        ]
    }

    pub fn eyes(&self) -> [Point2D; 2] {
        [self.left_pupil, self.right_pupil]
    }

    pub fn eyes_and_mouth(&self) -> [Point2D; 3] {
        [self.left_pupil, self.right_pupil, self.mouth]
    }

    pub fn map(&self, transform: &AffineTransform) -> LandmarkSet {
        LandmarkSet::new(transform.apply_all(self.points()))
    }

    pub fn is_finite(&self) -> bool {
        self.points().iter().all(Point2D::is_finite)
    }

    /// Slot-wise arithmetic mean. Returns `None` for an empty slice.
    pub fn mean(sets: &[LandmarkSet]) -> Option<LandmarkSet> {
        if sets.is_empty() {
            return None;
        }

        let mut sums = [Point2D::origin(); LANDMARK_COUNT];
        for set in sets {
            for (sum, point) in sums.iter_mut().zip(set.points()) {
                *sum = *sum + point;
            }
        }

        let count = sets.len() as f64;
        Some(LandmarkSet::new(sums.map(|sum| sum / count)))
    }
}
