use super::third_point::complete_triangle;
use super::{AffineTransform, Point2D};
use crate::error::{AlignResult, AlignmentError};

/// Triangles whose doubled area is below this fraction of the squared
/// longest side are treated as collinear.
const COLLINEAR_EPSILON: f64 = 1e-9;

/// Estimates a transform from point correspondences.
pub trait TransformEstimator: Send + Sync {
    /// Returns the name of the estimator
    fn name(&self) -> &str;

    /// Estimate the transform mapping `source[i]` onto `target[i]`.
    ///
    /// Both sides must hold 2 or 3 points. Two-point input is completed to a
    /// triangle on each side independently.
    fn estimate(&self, source: &[Point2D], target: &[Point2D]) -> AlignResult<AffineTransform> {
        let (source, target) = correspondence_triangles(source, target)?;
        check_triangle(&source, "source")?;
        check_triangle(&target, "target")?;
        self.estimate_triangles(&source, &target)
    }

    /// Estimate from two validated, non-degenerate triangles.
    fn estimate_triangles(
        &self,
        source: &[Point2D; 3],
        target: &[Point2D; 3],
    ) -> AlignResult<AffineTransform>;
}

/// Least-squares rotation + uniform scale + translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityEstimator;

/// Exact affine map through three correspondences.
#[derive(Debug, Clone, Copy, Default)]
pub struct AffineEstimator;

impl TransformEstimator for SimilarityEstimator {
    fn name(&self) -> &str {
        "similarity"
    }

    fn estimate_triangles(
        &self,
        source: &[Point2D; 3],
        target: &[Point2D; 3],
    ) -> AlignResult<AffineTransform> {
        let source_mean = centroid(source);
        let target_mean = centroid(target);

        let mut spread = 0.0;
        let mut cos_term = 0.0;
        let mut sin_term = 0.0;
        for (s, t) in source.iter().zip(target.iter()) {
            let s = *s - source_mean;
            let t = *t - target_mean;
            spread += s.squared_norm();
            cos_term += s.dot(&t);
            sin_term += s.cross(&t);
        }

        if spread <= 0.0 {
            return Err(AlignmentError::degenerate("source points have no spread"));
        }

        let a = cos_term / spread;
        let b = sin_term / spread;
        let transform = AffineTransform::new([
            [a, -b, target_mean.x - (a * source_mean.x - b * source_mean.y)],
            [b, a, target_mean.y - (b * source_mean.x + a * source_mean.y)],
        ]);

        ensure_usable(transform)
    }
}

impl TransformEstimator for AffineEstimator {
    fn name(&self) -> &str {
        "affine"
    }

    fn estimate_triangles(
        &self,
        source: &[Point2D; 3],
        target: &[Point2D; 3],
    ) -> AlignResult<AffineTransform> {
        let [s0, s1, s2] = *source;
        let ab = s1 - s0;
        let ac = s2 - s0;
        let det = ab.cross(&ac);
        if det == 0.0 {
            return Err(AlignmentError::degenerate("source triangle has zero area"));
        }

        // Each output row solves [ab; ac] * (p, q) = (du1, du2) by Cramer's rule.
        let solve_row = |u0: f64, u1: f64, u2: f64| -> [f64; 3] {
            let du1 = u1 - u0;
            let du2 = u2 - u0;
            let p = (du1 * ac.y - ab.y * du2) / det;
            let q = (ab.x * du2 - du1 * ac.x) / det;
            [p, q, u0 - p * s0.x - q * s0.y]
        };

        let [t0, t1, t2] = *target;
        let transform = AffineTransform::new([
            solve_row(t0.x, t1.x, t2.x),
            solve_row(t0.y, t1.y, t2.y),
        ]);

        ensure_usable(transform)
    }
}

/// Bring both sides of a correspondence to three points.
pub fn correspondence_triangles(
    source: &[Point2D],
    target: &[Point2D],
) -> AlignResult<([Point2D; 3], [Point2D; 3])> {
    match (source, target) {
        ([s0, s1], [t0, t1]) => Ok((complete_triangle([*s0, *s1]), complete_triangle([*t0, *t1]))),
        ([s0, s1, s2], [t0, t1, t2]) => Ok(([*s0, *s1, *s2], [*t0, *t1, *t2])),
        _ => Err(AlignmentError::CorrespondenceMismatch {
            source_len: source.len(),
            target_len: target.len(),
        }),
    }
}

/// Reject triangles that cannot constrain an affine map.
pub fn check_triangle(points: &[Point2D; 3], side: &str) -> AlignResult<()> {
    if !points.iter().all(Point2D::is_finite) {
        return Err(AlignmentError::degenerate(format!(
            "{} points contain non-finite coordinates",
            side
        )));
    }

    let [a, b, c] = *points;
    let ab = b - a;
    let ac = c - a;
    let bc = c - b;
    let longest = ab
        .squared_norm()
        .max(ac.squared_norm())
        .max(bc.squared_norm());

    if longest == 0.0 {
        return Err(AlignmentError::degenerate(format!(
            "{} points coincide",
            side
        )));
    }

    if ab.cross(&ac).abs() <= COLLINEAR_EPSILON * longest {
        return Err(AlignmentError::degenerate(format!(
            "{} points are collinear",
            side
        )));
    }

    Ok(())
}

fn centroid(points: &[Point2D; 3]) -> Point2D {
    (points[0] + points[1] + points[2]) / 3.0
}

fn ensure_usable(transform: AffineTransform) -> AlignResult<AffineTransform> {
    if !transform.is_finite() {
        return Err(AlignmentError::degenerate(
            "estimated transform has non-finite coefficients",
        ));
    }
    Ok(transform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatched_lengths() {
        let pts = [Point2D::new(0.0, 0.0), Point2D::new(1.0, 0.0)];
        let three = [pts[0], pts[1], Point2D::new(0.0, 1.0)];
        let err = SimilarityEstimator.estimate(&pts, &three).unwrap_err();
        assert_eq!(
            err,
            AlignmentError::CorrespondenceMismatch {
                source_len: 2,
                target_len: 3
            }
        );
        assert!(AffineEstimator.estimate(&pts[..1], &pts[..1]).is_err());
    }

    #[test]
    fn test_check_triangle() {
        let good = [
            Point2D::new(0.0, 0.0),
            Point2D::new(4.0, 0.0),
            Point2D::new(0.0, 3.0),
        ];
        assert!(check_triangle(&good, "source").is_ok());

        let line = [
            Point2D::new(0.0, 0.0),
            Point2D::new(1.0, 1.0),
            Point2D::new(5.0, 5.0),
        ];
        assert!(check_triangle(&line, "source").is_err());

        let point = [Point2D::new(2.0, 2.0); 3];
        assert!(check_triangle(&point, "target").is_err());

        let nan = [Point2D::new(f64::NAN, 0.0), good[1], good[2]];
        assert!(check_triangle(&nan, "source").is_err());
    }

    #[test]
    fn test_two_point_similarity_is_exact() {
        let source = [Point2D::new(10.0, 10.0), Point2D::new(30.0, 10.0)];
        let target = [Point2D::new(210.0, 320.0), Point2D::new(390.0, 320.0)];
        let t = SimilarityEstimator.estimate(&source, &target).unwrap();
        assert!(t.apply(source[0]).approx_eq(&target[0], 1e-9));
        assert!(t.apply(source[1]).approx_eq(&target[1], 1e-9));
        assert!((t.decompose().scale_x - 9.0).abs() < 1e-9);
    }
}
