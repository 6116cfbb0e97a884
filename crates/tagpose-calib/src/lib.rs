//! Planar camera calibration from checkerboard samples.
//!
//! The solver follows the classic planar pipeline: a normalized-DLT
//! homography per sample, Zhang's closed-form intrinsics from the
//! homography constraints, per-sample extrinsics from `K⁻¹H`, then a joint
//! Levenberg-Marquardt refinement of intrinsics, distortion, and all
//! per-sample poses against total reprojection error. Solved parameters
//! persist in a headerless flat-text store.

mod linear;
mod session;
mod solve;
mod store;
mod types;

pub use session::{CaptureSession, MIN_SAMPLES};
pub use solve::{solve, SolvedCalibration};
pub use store::{load_calibration, save_calibration, StoreError};
pub use types::{CameraCalibration, CalibrationError, DIST_COEFFS};
