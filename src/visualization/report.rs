use crate::analysis::{ExcludedSummary, RunSummary};
use crate::geometry::LANDMARK_NAMES;

pub fn print_run_summary(summary: &RunSummary) {
    println!("=== Face Averaging Run {} ===", summary.correlation_id);
    println!("Canvas: {}x{}", summary.canvas.0, summary.canvas.1);
    println!(
        "Aligned: {}  Excluded: {}",
        summary.photos.len(),
        summary.excluded.len()
    );
    println!();

    println!("Averaged landmarks:");
    for (name, point) in LANDMARK_NAMES.iter().zip(summary.averaged_landmarks.points()) {
        println!("  {:<16} {}", name, point);
    }
    println!();

    println!("| # | Photo | Translation | Rotation (°) | Scale | Shear | Residual mean/max (px) |");
    println!("|---|-------|-------------|--------------|-------|-------|------------------------|");
    for photo in &summary.photos {
        let p = &photo.params;
        println!(
            "| {} | {} | ({:.2}, {:.2}) | {:.2} | {:.3}/{:.3} | {:.4} | {:.3}/{:.3} |",
            photo.index,
            photo.label,
            p.translation.0,
            p.translation.1,
            p.rotation_degrees,
            p.scale_x,
            p.scale_y,
            p.shear,
            photo.residuals.mean,
            photo.residuals.max
        );
    }
    println!();

    println!("Stage timings:");
    for timing in &summary.stage_timings {
        println!("  {:<10} {:>9.2}ms", timing.stage_name, timing.duration_ms);
    }
    println!(
        "Mean residual: {:.3}px  Max residual: {:.3}px",
        summary.mean_residual_px, summary.max_residual_px
    );

    print_dropped(&summary.excluded);
}

pub fn print_dropped(excluded: &[ExcludedSummary]) {
    if excluded.is_empty() {
        return;
    }

    println!();
    println!("Excluded photos:");
    for photo in excluded {
        let index = photo
            .index
            .map_or_else(|| "-".to_string(), |index| index.to_string());
        println!("  [{}] {} ({}): {}", photo.stage, photo.label, index, photo.reason);
    }
}
