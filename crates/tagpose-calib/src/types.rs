//! Calibration data model and the projection it defines.

use nalgebra::{Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

use tagpose_core::rotation_from_rvec;

/// Number of distortion coefficients the solver estimates
/// (`k1, k2, p1, p2, k3`).
pub const DIST_COEFFS: usize = 5;

/// Errors from the calibration solver.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("no calibration samples provided")]
    InsufficientSamples,
    #[error("sample {sample} has {got} points, board expects {expected}")]
    SampleSizeMismatch {
        sample: usize,
        expected: usize,
        got: usize,
    },
    #[error("degenerate calibration solve: {0}")]
    Degenerate(&'static str),
}

/// Solved camera model: intrinsic matrix plus distortion coefficients.
///
/// `k` is upper-triangular projective form with positive focal entries.
/// `dist` follows the `k1, k2, p1, p2, k3` convention; the length is fixed
/// by whoever produced the value (the solver writes [`DIST_COEFFS`], the
/// store reads whatever length the caller declares). Coefficients beyond
/// index 4 are carried but ignored by the projection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub k: Matrix3<f64>,
    pub dist: Vec<f64>,
}

impl CameraCalibration {
    pub fn new(k: Matrix3<f64>, dist: Vec<f64>) -> Self {
        Self { k, dist }
    }

    /// Identity intrinsics, zero distortion. The reference startup state
    /// before a stored calibration is loaded.
    pub fn unit() -> Self {
        Self {
            k: Matrix3::identity(),
            dist: vec![0.0; DIST_COEFFS],
        }
    }

    #[inline]
    pub fn fx(&self) -> f64 {
        self.k[(0, 0)]
    }

    #[inline]
    pub fn fy(&self) -> f64 {
        self.k[(1, 1)]
    }

    #[inline]
    pub fn cx(&self) -> f64 {
        self.k[(0, 2)]
    }

    #[inline]
    pub fn cy(&self) -> f64 {
        self.k[(1, 2)]
    }

    #[inline]
    fn coeff(&self, i: usize) -> f64 {
        self.dist.get(i).copied().unwrap_or(0.0)
    }

    /// Apply the radial/tangential distortion model to normalized image
    /// coordinates.
    pub fn distort_normalized(&self, x: f64, y: f64) -> (f64, f64) {
        let (k1, k2, p1, p2, k3) = (
            self.coeff(0),
            self.coeff(1),
            self.coeff(2),
            self.coeff(3),
            self.coeff(4),
        );
        let r2 = x * x + y * y;
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;
        let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        (xd, yd)
    }

    /// Project a camera-frame point to pixel coordinates.
    ///
    /// Returns `None` for points at or behind the optical center plane.
    pub fn project_camera(&self, p_cam: &Vector3<f64>) -> Option<Point2<f64>> {
        if p_cam.z <= 1e-12 {
            return None;
        }
        let (xd, yd) = self.distort_normalized(p_cam.x / p_cam.z, p_cam.y / p_cam.z);
        let u = self.k[(0, 0)] * xd + self.k[(0, 1)] * yd + self.k[(0, 2)];
        let v = self.k[(1, 1)] * yd + self.k[(1, 2)];
        Some(Point2::new(u, v))
    }

    /// Project a world point through a pose given as rotation vector +
    /// translation.
    pub fn project_world(
        &self,
        p_world: &Point3<f64>,
        rvec: &Vector3<f64>,
        tvec: &Vector3<f64>,
    ) -> Option<Point2<f64>> {
        let r = rotation_from_rvec(rvec);
        let p_cam = r * p_world.coords + tvec;
        self.project_camera(&p_cam)
    }
}
