use super::Point2D;
use crate::error::{AlignResult, AlignmentError};
use serde::{Deserialize, Serialize};

/// Determinants with a smaller magnitude are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// 2x3 affine transform acting on homogeneous points `(x, y, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub matrix: [[f64; 3]; 2],
}

/// Human-readable decomposition of an affine transform.
///
/// The linear part is factored as rotation * shear * scale, so for a pure
/// similarity `shear` is zero and both scales are equal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformParams {
    pub translation: (f64, f64),
    pub rotation_degrees: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub shear: f64,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub const fn new(matrix: [[f64; 3]; 2]) -> Self {
        Self { matrix }
    }

    pub const fn identity() -> Self {
        Self {
            matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            matrix: [[1.0, 0.0, dx], [0.0, 1.0, dy]],
        }
    }

    /// Rotation by `angle_degrees` and uniform `scale` about `center`.
    pub fn similarity_about(center: Point2D, angle_degrees: f64, scale: f64) -> Self {
        let (sin, cos) = angle_degrees.to_radians().sin_cos();
        let a = scale * cos;
        let b = scale * sin;
        Self {
            matrix: [
                [a, -b, center.x - a * center.x + b * center.y],
                [b, a, center.y - b * center.x - a * center.y],
            ],
        }
    }

    pub fn apply(&self, point: Point2D) -> Point2D {
        let m = &self.matrix;
        Point2D {
            x: m[0][0] * point.x + m[0][1] * point.y + m[0][2],
            y: m[1][0] * point.x + m[1][1] * point.y + m[1][2],
        }
    }

    pub fn apply_all<const N: usize>(&self, points: [Point2D; N]) -> [Point2D; N] {
        points.map(|p| self.apply(p))
    }

    /// Determinant of the linear 2x2 part.
    pub fn determinant(&self) -> f64 {
        let m = &self.matrix;
        m[0][0] * m[1][1] - m[0][1] * m[1][0]
    }

    pub fn inverse(&self) -> AlignResult<AffineTransform> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return Err(AlignmentError::degenerate(format!(
                "transform is not invertible (determinant {:e})",
                det
            )));
        }

        let m = &self.matrix;
        let a = m[1][1] / det;
        let b = -m[0][1] / det;
        let c = -m[1][0] / det;
        let d = m[0][0] / det;

        Ok(Self {
            matrix: [
                [a, b, -(a * m[0][2] + b * m[1][2])],
                [c, d, -(c * m[0][2] + d * m[1][2])],
            ],
        })
    }

    /// Transform that applies `self` first, then `next`.
    pub fn then(&self, next: &AffineTransform) -> AffineTransform {
        let p = &self.matrix;
        let n = &next.matrix;
        let mut matrix = [[0.0; 3]; 2];
        for row in 0..2 {
            matrix[row][0] = n[row][0] * p[0][0] + n[row][1] * p[1][0];
            matrix[row][1] = n[row][0] * p[0][1] + n[row][1] * p[1][1];
            matrix[row][2] = n[row][0] * p[0][2] + n[row][1] * p[1][2] + n[row][2];
        }
        Self { matrix }
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.iter().flatten().all(|v| v.is_finite())
    }

    pub fn approx_eq(&self, other: &AffineTransform, epsilon: f64) -> bool {
        self.matrix
            .iter()
            .flatten()
            .zip(other.matrix.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }

    pub fn decompose(&self) -> TransformParams {
        let m = &self.matrix;
        let (a, b, c, d) = (m[0][0], m[0][1], m[1][0], m[1][1]);

        let scale_x = (a * a + c * c).sqrt();
        let rotation = c.atan2(a);
        let det = self.determinant();
        let scale_y = if scale_x > 0.0 {
            det / scale_x
        } else {
            (b * b + d * d).sqrt()
        };
        let shear = if scale_x > 0.0 && scale_y != 0.0 {
            (a * b + c * d) / (scale_x * scale_y)
        } else {
            0.0
        };

        TransformParams {
            translation: (m[0][2], m[1][2]),
            rotation_degrees: rotation.to_degrees(),
            scale_x,
            scale_y,
            shear,
        }
    }
}

impl std::fmt::Display for AffineTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = &self.matrix;
        write!(
            f,
            "[[{:.4}, {:.4}, {:.2}], [{:.4}, {:.4}, {:.2}]]",
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_apply() {
        let p = Point2D::new(3.5, -2.0);
        assert_eq!(AffineTransform::identity().apply(p), p);
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = AffineTransform::new([[1.2, 0.3, 14.0], [-0.4, 0.9, -6.0]]);
        let inv = t.inverse().unwrap();
        let p = Point2D::new(120.0, 48.0);
        assert!(inv.apply(t.apply(p)).approx_eq(&p, 1e-9));
        assert!(t.then(&inv).approx_eq(&AffineTransform::identity(), 1e-12));
    }

    #[test]
    fn test_singular_inverse_is_degenerate() {
        let t = AffineTransform::new([[1.0, 2.0, 0.0], [2.0, 4.0, 0.0]]);
        assert!(matches!(
            t.inverse(),
            Err(AlignmentError::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn test_composition_order() {
        let shift = AffineTransform::translation(10.0, 0.0);
        let double = AffineTransform::new([[2.0, 0.0, 0.0], [0.0, 2.0, 0.0]]);
        let p = Point2D::new(1.0, 1.0);
        assert_eq!(shift.then(&double).apply(p), Point2D::new(22.0, 2.0));
        assert_eq!(double.then(&shift).apply(p), Point2D::new(12.0, 2.0));
    }

    #[test]
    fn test_decompose_similarity() {
        let t = AffineTransform::similarity_about(Point2D::new(50.0, 50.0), 30.0, 1.5);
        let params = t.decompose();
        assert!((params.rotation_degrees - 30.0).abs() < 1e-9);
        assert!((params.scale_x - 1.5).abs() < 1e-9);
        assert!((params.scale_y - 1.5).abs() < 1e-9);
        assert!(params.shear.abs() < 1e-9);
        assert!(t.apply(Point2D::new(50.0, 50.0)).approx_eq(&Point2D::new(50.0, 50.0), 1e-9));
    }
}
