use serde::{Deserialize, Serialize};

/// Tuning knobs for the checkerboard corner extractor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractorParams {
    /// Adaptive-threshold window radius as a fraction of the larger frame
    /// dimension.
    pub threshold_radius_frac: f32,
    /// Adaptive-threshold offset (higher pushes ambiguous pixels to black).
    pub threshold_offset: i16,
    /// Radius of the corner-response sampling ring, in pixels.
    pub ring_radius: f32,
    /// Non-maximum suppression radius, in pixels.
    pub nms_radius: usize,
    /// Keep candidates with response >= this fraction of the frame maximum.
    pub rel_strength: f32,
    /// Snap tolerance for predicted grid nodes, as a fraction of the grid
    /// spacing.
    pub snap_tol_frac: f32,
}

impl Default for ExtractorParams {
    fn default() -> Self {
        Self {
            threshold_radius_frac: 0.0625,
            threshold_offset: 4,
            ring_radius: 4.0,
            nms_radius: 3,
            rel_strength: 0.3,
            snap_tol_frac: 0.35,
        }
    }
}
