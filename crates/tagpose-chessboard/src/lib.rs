//! Full-grid checkerboard corner extraction.
//!
//! The extractor locates every interior corner of a known checkerboard or
//! reports nothing at all; a partial grid is treated as not-found. Pipeline:
//!
//! 1. Contrast normalization and adaptive local thresholding (core crate).
//! 2. Ring-sample X-corner response on the binary image, non-maximum
//!    suppression, centroid sub-pixel refinement.
//! 3. Grid organization: a homography seeded from the four extreme
//!    candidates predicts every interior node, and each prediction must
//!    snap uniquely to a nearby candidate for the extraction to succeed.

mod extract;
mod grid;
mod params;
mod response;

pub use extract::{extract_corners, extract_corners_batch};
pub use grid::organize_grid;
pub use params::ExtractorParams;
pub use response::{detect_corner_candidates, CornerCandidate};
