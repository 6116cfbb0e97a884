//! Planar pose of a single marker.
//!
//! The observed quad is undistorted into normalized image coordinates,
//! a four-point homography maps the marker's canonical square onto it,
//! and the homography decomposes into `[r1 r2 t]` the same way the
//! calibration stage recovers board extrinsics.

use log::warn;
use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

use tagpose_aruco::MarkerObservation;
use tagpose_calib::CameraCalibration;
use tagpose_core::{estimate_homography, rvec_from_rotation};

/// 6DoF pose of one marker in the camera frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PoseEstimate {
    pub id: u32,
    /// Rotation vector, axis-angle form.
    pub rvec: Vector3<f64>,
    /// Translation, in the marker-edge unit (meters when the edge is).
    pub tvec: Vector3<f64>,
}

/// Fixed-point inversion of the radial/tangential distortion model.
fn undistort_normalized(calib: &CameraCalibration, xd: f64, yd: f64) -> (f64, f64) {
    let mut x = xd;
    let mut y = yd;
    for _ in 0..10 {
        // distort() = radial * p + tangential; peel both off around the
        // current estimate.
        let (px, py) = calib.distort_normalized(x, y);
        let radial = radial_factor(calib, x * x + y * y);
        let tang_x = px - x * radial;
        let tang_y = py - y * radial;
        x = (xd - tang_x) / radial;
        y = (yd - tang_y) / radial;
    }
    (x, y)
}

#[inline]
fn radial_factor(calib: &CameraCalibration, r2: f64) -> f64 {
    let k1 = calib.dist.first().copied().unwrap_or(0.0);
    let k2 = calib.dist.get(1).copied().unwrap_or(0.0);
    let k3 = calib.dist.get(4).copied().unwrap_or(0.0);
    1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2
}

/// Pixel coordinates to undistorted normalized image coordinates.
fn pixel_to_normalized(calib: &CameraCalibration, p: &Point2<f32>) -> (f64, f64) {
    let v = (p.y as f64 - calib.cy()) / calib.fy();
    let u = (p.x as f64 - calib.cx() - calib.k[(0, 1)] * v) / calib.fx();
    undistort_normalized(calib, u, v)
}

/// Corners of the marker's own square, centered at its origin, Z = 0,
/// in TL, TR, BR, BL order matching the canonical observation order.
fn canonical_square(edge: f64) -> [Point2<f64>; 4] {
    let h = edge / 2.0;
    [
        Point2::new(-h, -h),
        Point2::new(h, -h),
        Point2::new(h, h),
        Point2::new(-h, h),
    ]
}

/// Estimate the pose of one observed marker.
///
/// `None` when the homography or its decomposition is degenerate (e.g. a
/// collapsed quad).
pub fn estimate_pose(
    obs: &MarkerObservation,
    marker_edge: f64,
    calib: &CameraCalibration,
) -> Option<PoseEstimate> {
    for i in 0..4 {
        for j in (i + 1)..4 {
            if (obs.corners[i] - obs.corners[j]).norm() < 1.0 {
                return None;
            }
        }
    }

    let world = canonical_square(marker_edge);
    let image: Vec<Point2<f64>> = obs
        .corners
        .iter()
        .map(|c| {
            let (x, y) = pixel_to_normalized(calib, c);
            Point2::new(x, y)
        })
        .collect();

    let h = estimate_homography(&world, &image)?.h;
    let (rvec, tvec) = decompose_planar(&h)?;
    Some(PoseEstimate {
        id: obs.id,
        rvec,
        tvec,
    })
}

/// Pose for every observation; solves that fail geometrically are dropped
/// with a warning, which downstream id lookups tolerate.
pub fn estimate_poses(
    observations: &[MarkerObservation],
    marker_edge: f64,
    calib: &CameraCalibration,
) -> Vec<PoseEstimate> {
    observations
        .iter()
        .filter_map(|obs| {
            let pose = estimate_pose(obs, marker_edge, calib);
            if pose.is_none() {
                warn!("pose solve failed for marker id {}", obs.id);
            }
            pose
        })
        .collect()
}

/// `[r1 r2 t]` decomposition of a normalized-coordinate plane homography.
fn decompose_planar(h: &Matrix3<f64>) -> Option<(Vector3<f64>, Vector3<f64>)> {
    let r1_raw: Vector3<f64> = h.column(0).into();
    let r2_raw: Vector3<f64> = h.column(1).into();
    let t_raw: Vector3<f64> = h.column(2).into();

    let n1 = r1_raw.norm();
    let n2 = r2_raw.norm();
    if n1 <= 1e-12 || n2 <= 1e-12 {
        return None;
    }
    let scale = 2.0 / (n1 + n2);

    let mut r1 = r1_raw * scale;
    let mut r2 = r2_raw * scale;
    let mut t = t_raw * scale;
    // The marker must sit in front of the camera.
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }
    let r3 = r1.cross(&r2);

    let mut r = Matrix3::zeros();
    r.set_column(0, &r1);
    r.set_column(1, &r2);
    r.set_column(2, &r3);

    let svd = r.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    Some((rvec_from_rotation(&r_orth), t))
}
