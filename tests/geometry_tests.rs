use face_averaging::geometry::{
    complete_triangle, third_point, AffineEstimator, AffineTransform, Point2D, SimilarityEstimator,
    TransformEstimator,
};
use face_averaging::AlignmentError;

fn rounded(p: Point2D) -> (f64, f64) {
    ((p.x * 1000.0).round() / 1000.0, (p.y * 1000.0).round() / 1000.0)
}

#[test]
fn test_third_point_reference_values() {
    assert_eq!(
        rounded(third_point(Point2D::new(0.0, 0.0), Point2D::new(2.0, 0.0))),
        (1.0, -1.732)
    );
    assert_eq!(
        rounded(third_point(Point2D::new(0.0, 0.0), Point2D::new(0.0, 2.0))),
        (1.732, 1.0)
    );
    assert_eq!(
        rounded(third_point(Point2D::new(2.0, 2.0), Point2D::new(4.0, 2.0))),
        (3.0, 0.268)
    );
}

#[test]
fn test_third_point_follows_similarity_transforms() {
    let a = Point2D::new(12.0, 30.0);
    let b = Point2D::new(48.0, 27.0);
    let t = AffineTransform::similarity_about(Point2D::new(5.0, 5.0), 23.0, 1.7)
        .then(&AffineTransform::translation(-9.0, 14.0));

    let mapped_then_completed = third_point(t.apply(a), t.apply(b));
    let completed_then_mapped = t.apply(third_point(a, b));
    assert!(mapped_then_completed.approx_eq(&completed_then_mapped, 1e-9));
}

#[test]
fn test_affine_solve_is_exact() {
    let triangles = [
        (
            [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)],
            [(5.0, 5.0), (25.0, 8.0), (3.0, 40.0)],
        ),
        (
            [(210.0, 320.0), (390.0, 320.0), (300.0, 520.0)],
            [(198.5, 301.2), (402.7, 333.9), (291.0, 548.4)],
        ),
        (
            [(-3.0, 7.5), (100.25, -40.0), (55.0, 90.0)],
            [(1.0, 1.0), (2.0, 1.5), (1.2, 3.0)],
        ),
    ];

    for (source, target) in triangles {
        let source = source.map(Point2D::from);
        let target = target.map(Point2D::from);
        let transform = AffineEstimator.estimate(&source, &target).unwrap();
        for (s, t) in source.iter().zip(&target) {
            assert!(
                transform.apply(*s).approx_eq(t, 1e-6),
                "{} mapped to {}, expected {}",
                s,
                transform.apply(*s),
                t
            );
        }
    }
}

#[test]
fn test_collinear_correspondences_are_rejected() {
    let collinear = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)].map(Point2D::from);
    let triangle = [(0.0, 0.0), (4.0, 0.0), (0.0, 4.0)].map(Point2D::from);

    for estimator in [
        &SimilarityEstimator as &dyn TransformEstimator,
        &AffineEstimator as &dyn TransformEstimator,
    ] {
        assert!(matches!(
            estimator.estimate(&collinear, &triangle),
            Err(AlignmentError::DegenerateGeometry { .. })
        ));
        assert!(matches!(
            estimator.estimate(&triangle, &collinear),
            Err(AlignmentError::DegenerateGeometry { .. })
        ));
    }
}

#[test]
fn test_coincident_pair_is_rejected() {
    let pair = [Point2D::new(50.0, 50.0), Point2D::new(50.0, 50.0)];
    let targets = [Point2D::new(210.0, 320.0), Point2D::new(390.0, 320.0)];
    assert!(matches!(
        SimilarityEstimator.estimate(&pair, &targets),
        Err(AlignmentError::DegenerateGeometry { .. })
    ));
}

#[test]
fn test_similarity_recovers_known_transform() {
    let expected = AffineTransform::similarity_about(Point2D::new(100.0, 120.0), -12.5, 0.85)
        .then(&AffineTransform::translation(31.0, -7.0));
    let source = [(80.0, 100.0), (140.0, 104.0), (112.0, 190.0)].map(Point2D::from);
    let target = expected.apply_all(source);

    let estimated = SimilarityEstimator.estimate(&source, &target).unwrap();
    assert!(estimated.approx_eq(&expected, 1e-9), "{} vs {}", estimated, expected);

    let params = estimated.decompose();
    assert!((params.rotation_degrees + 12.5).abs() < 1e-9);
    assert!((params.scale_x - 0.85).abs() < 1e-9);
    assert!((params.scale_y - 0.85).abs() < 1e-9);
    assert!(params.shear.abs() < 1e-9);
}

#[test]
fn test_two_point_similarity_hits_both_targets() {
    let eyes = [Point2D::new(180.0, 260.0), Point2D::new(300.0, 290.0)];
    let targets = [Point2D::new(210.0, 320.0), Point2D::new(390.0, 320.0)];
    let transform = SimilarityEstimator.estimate(&eyes, &targets).unwrap();
    assert!(transform.apply(eyes[0]).approx_eq(&targets[0], 1e-9));
    assert!(transform.apply(eyes[1]).approx_eq(&targets[1], 1e-9));
}

#[test]
fn test_similarity_least_squares_on_inconsistent_triangle() {
    // The mouth disagrees with a pure similarity; eyes should still land close.
    let source = [(0.0, 0.0), (10.0, 0.0), (5.0, 10.0)].map(Point2D::from);
    let target = [(0.0, 0.0), (10.0, 0.0), (5.0, 12.0)].map(Point2D::from);
    let transform = SimilarityEstimator.estimate(&source, &target).unwrap();
    let params = transform.decompose();
    assert!((params.scale_x - params.scale_y).abs() < 1e-12);
    assert!(params.shear.abs() < 1e-12);

    let exact = AffineEstimator.estimate(&source, &target).unwrap();
    assert!(exact.apply(source[2]).approx_eq(&target[2], 1e-9));
    let triangle = complete_triangle([source[0], source[1]]);
    assert_eq!(triangle[0], source[0]);
}
