//! Pose of one marker expressed in another marker's frame.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use tagpose_core::rotation_from_rvec;

use crate::pose::PoseEstimate;

/// Target marker's pose relative to the base marker.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RelativePose {
    pub base_id: u32,
    pub target_id: u32,
    /// Translation from base to target, in the base marker's own axes.
    pub translation: Vector3<f64>,
    /// Per-axis difference of the two rotation vectors. Only meaningful in
    /// the small-angle / near-aligned regime; this is not a proper rotation
    /// composition and is kept as an approximate readout.
    pub rotation_delta: Vector3<f64>,
}

impl RelativePose {
    /// Rotation matrix of the delta vector, for the end-of-session dump.
    pub fn rotation_delta_matrix(&self) -> Matrix3<f64> {
        rotation_from_rvec(&self.rotation_delta)
    }
}

/// Relative pose of `target_id` with respect to `base_id`.
///
/// `None` when either id is absent from the frame. When an id appears more
/// than once (duplicate printouts in view), the first estimate in detection
/// order wins.
pub fn compute_relative(
    base_id: u32,
    target_id: u32,
    estimates: &[PoseEstimate],
) -> Option<RelativePose> {
    let base = estimates.iter().find(|p| p.id == base_id)?;
    let target = estimates.iter().find(|p| p.id == target_id)?;

    let delta = target.tvec - base.tvec;
    let r_base = rotation_from_rvec(&base.rvec);
    let translation = r_base.transpose() * delta;
    let rotation_delta = target.rvec - base.rvec;

    Some(RelativePose {
        base_id,
        target_id,
        translation,
        rotation_delta,
    })
}
