//! Corner extraction entry points.

use log::{debug, info};

use tagpose_core::{
    adaptive_threshold, normalize_contrast, BoardSpec, CalibrationSample, GrayImageView,
};

use crate::grid::organize_grid;
use crate::params::ExtractorParams;
use crate::response::detect_corner_candidates;

/// Extract the complete interior corner grid of `board` from one frame.
///
/// Returns `None` when the full grid cannot be resolved; a partial result
/// is never produced.
pub fn extract_corners(
    image: &GrayImageView<'_>,
    board: &BoardSpec,
    params: &ExtractorParams,
) -> Option<CalibrationSample> {
    let normalized = normalize_contrast(image);
    let radius = ((image.width.max(image.height) as f32 * params.threshold_radius_frac) as usize)
        .max(2);
    let binary = adaptive_threshold(&normalized.view(), radius, params.threshold_offset);

    let candidates = detect_corner_candidates(&binary.view(), params);
    debug!(
        "corner extraction: {} candidates for a {}x{} grid",
        candidates.len(),
        board.rows,
        board.cols
    );

    let positions: Vec<_> = candidates.iter().map(|c| c.position).collect();
    let points = organize_grid(&positions, board.rows, board.cols, params)?;
    Some(CalibrationSample { points })
}

/// Batch variant over a collection of frames.
///
/// Only succeeding extractions are accumulated; failures are silently
/// dropped. That is deliberate policy for calibration capture, not an
/// error path.
pub fn extract_corners_batch<'a, I>(
    images: I,
    board: &BoardSpec,
    params: &ExtractorParams,
) -> Vec<CalibrationSample>
where
    I: IntoIterator<Item = GrayImageView<'a>>,
{
    let mut samples = Vec::new();
    let mut seen = 0usize;
    for image in images {
        seen += 1;
        match extract_corners(&image, board, params) {
            Some(sample) => samples.push(sample),
            None => debug!("frame {} dropped: grid not resolved", seen),
        }
    }
    info!("corner extraction: accepted {} of {} frames", samples.len(), seen);
    samples
}
