use super::Point2D;
use std::f64::consts::FRAC_PI_3;

/// Third vertex of the equilateral triangle on `a` and `b`.
///
/// The vertex is found by rotating `a` about `b` by 60 degrees. Transform
/// estimation needs three non-collinear correspondences; when only two are
/// known this manufactures the third one for both sides of a correspondence.
pub fn third_point(a: Point2D, b: Point2D) -> Point2D {
    a.rotate_about(b, FRAC_PI_3)
}

/// Extend a two-point correspondence side to three points, keeping order.
pub fn complete_triangle(pair: [Point2D; 2]) -> [Point2D; 3] {
    [pair[0], pair[1], third_point(pair[0], pair[1])]
}
