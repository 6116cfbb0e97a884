//! Closed-form initialization: Zhang's method.
//!
//! Each calibration sample induces a homography from the `Z = 0` board
//! plane to the image. The homography constraints on the image of the
//! absolute conic give a linear system `V b = 0` whose solution yields the
//! intrinsics; the per-sample extrinsics then follow from `K⁻¹ H` with an
//! SVD projection onto SO(3).

use nalgebra::{DMatrix, Matrix3, Point2, Vector3};

use tagpose_core::{estimate_homography, rvec_from_rotation, BoardSpec, CalibrationSample};

use crate::types::CalibrationError;

/// Plane-to-image homography for one calibration sample.
pub(crate) fn sample_homography(
    sample: &CalibrationSample,
    board: &BoardSpec,
) -> Result<Matrix3<f64>, CalibrationError> {
    let world: Vec<Point2<f64>> = board
        .world_points()
        .iter()
        .map(|p| Point2::new(p.x, p.y))
        .collect();
    let image: Vec<Point2<f64>> = sample
        .points
        .iter()
        .map(|p| Point2::new(p.x as f64, p.y as f64))
        .collect();

    estimate_homography(&world, &image)
        .map(|h| h.h)
        .ok_or(CalibrationError::Degenerate("homography estimation failed"))
}

fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> [f64; 6] {
    [
        h[(0, i)] * h[(0, j)],
        h[(0, i)] * h[(1, j)] + h[(1, i)] * h[(0, j)],
        h[(1, i)] * h[(1, j)],
        h[(2, i)] * h[(0, j)] + h[(0, i)] * h[(2, j)],
        h[(2, i)] * h[(1, j)] + h[(1, i)] * h[(2, j)],
        h[(2, i)] * h[(2, j)],
    ]
}

/// Closed-form intrinsics from at least three plane homographies.
///
/// Skew is forced to zero after extraction; the refinement stage never
/// touches it either.
pub(crate) fn intrinsics_from_homographies(
    homographies: &[Matrix3<f64>],
) -> Result<Matrix3<f64>, CalibrationError> {
    if homographies.len() < 3 {
        return Err(CalibrationError::Degenerate(
            "need at least 3 homographies for intrinsics",
        ));
    }

    let mut v = DMatrix::<f64>::zeros(2 * homographies.len(), 6);
    for (i, h) in homographies.iter().enumerate() {
        let v12 = v_ij(h, 0, 1);
        let v11 = v_ij(h, 0, 0);
        let v22 = v_ij(h, 1, 1);
        for j in 0..6 {
            v[(2 * i, j)] = v12[j];
            v[(2 * i + 1, j)] = v11[j] - v22[j];
        }
    }

    let svd = v.svd(true, true);
    let vt = svd
        .v_t
        .ok_or(CalibrationError::Degenerate("SVD failed on conic system"))?;
    let b = vt.row(vt.nrows() - 1);
    let mut b11 = b[0];
    let mut b12 = b[1];
    let mut b22 = b[2];
    let mut b13 = b[3];
    let mut b23 = b[4];
    let mut b33 = b[5];

    let extract = |b11: f64, b12: f64, b22: f64, b13: f64, b23: f64, b33: f64| {
        let denom = b11 * b22 - b12 * b12;
        if denom.abs() < 1e-18 || b11.abs() < 1e-18 {
            return None;
        }
        let v0 = (b12 * b13 - b11 * b23) / denom;
        let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
        if lambda <= 0.0 || lambda / b11 <= 0.0 {
            return None;
        }
        let alpha = (lambda / b11).sqrt();
        let beta = (lambda * b11 / denom).sqrt();
        let gamma = -b12 * alpha * alpha * beta / lambda;
        let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;
        Some((alpha, beta, u0, v0))
    };

    // The nullspace sign is arbitrary; flip once if the first try fails.
    let params = match extract(b11, b12, b22, b13, b23, b33) {
        Some(p) => p,
        None => {
            b11 = -b11;
            b12 = -b12;
            b22 = -b22;
            b13 = -b13;
            b23 = -b23;
            b33 = -b33;
            extract(b11, b12, b22, b13, b23, b33)
                .ok_or(CalibrationError::Degenerate("conic system not positive"))?
        }
    };

    let (alpha, beta, u0, v0) = params;
    if !(alpha.is_finite() && beta.is_finite() && u0.is_finite() && v0.is_finite()) {
        return Err(CalibrationError::Degenerate("non-finite intrinsics"));
    }

    Ok(Matrix3::new(alpha, 0.0, u0, 0.0, beta, v0, 0.0, 0.0, 1.0))
}

/// Pose of the board plane for one homography, given intrinsics.
pub(crate) fn extrinsics_from_homography(
    k: &Matrix3<f64>,
    h: &Matrix3<f64>,
) -> Result<(Vector3<f64>, Vector3<f64>), CalibrationError> {
    let k_inv = k
        .try_inverse()
        .ok_or(CalibrationError::Degenerate("intrinsics not invertible"))?;

    let r1_raw = k_inv * h.column(0);
    let r2_raw = k_inv * h.column(1);
    let t_raw = k_inv * h.column(2);

    let n1 = r1_raw.norm();
    let n2 = r2_raw.norm();
    if n1 <= 1e-12 || n2 <= 1e-12 {
        return Err(CalibrationError::Degenerate("degenerate homography columns"));
    }
    let scale = 2.0 / (n1 + n2);

    let mut r1 = r1_raw * scale;
    let mut r2 = r2_raw * scale;
    let mut t = t_raw * scale;
    // Board must sit in front of the camera.
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

    // Nearest rotation: polar decomposition via SVD.
    let svd = r.svd(true, true);
    let u = svd
        .u
        .ok_or(CalibrationError::Degenerate("SVD failed on rotation"))?;
    let v_t = svd
        .v_t
        .ok_or(CalibrationError::Degenerate("SVD failed on rotation"))?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    Ok((rvec_from_rotation(&r_orth), t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    fn known_k() -> Matrix3<f64> {
        Matrix3::new(800.0, 0.0, 320.0, 0.0, 780.0, 240.0, 0.0, 0.0, 1.0)
    }

    fn homography_for_pose(k: &Matrix3<f64>, rot: &Rotation3<f64>, t: &Vector3<f64>) -> Matrix3<f64> {
        // For the Z=0 plane: H = K [r1 r2 t].
        let r = rot.matrix();
        let mut rt = Matrix3::zeros();
        rt.set_column(0, &r.column(0));
        rt.set_column(1, &r.column(1));
        rt.set_column(2, t);
        let h = k * rt;
        h / h[(2, 2)]
    }

    #[test]
    fn recovers_intrinsics_from_synthetic_homographies() {
        let k = known_k();
        let poses = [
            (0.2, -0.1, 0.05, 0.02, -0.05, 0.6),
            (-0.25, 0.15, -0.1, -0.04, 0.03, 0.7),
            (0.1, 0.3, 0.2, 0.05, 0.02, 0.5),
            (-0.15, -0.2, 0.1, -0.02, -0.03, 0.8),
        ];
        let hs: Vec<Matrix3<f64>> = poses
            .iter()
            .map(|&(rx, ry, rz, tx, ty, tz)| {
                let rot = Rotation3::from_euler_angles(rx, ry, rz);
                homography_for_pose(&k, &rot, &Vector3::new(tx, ty, tz))
            })
            .collect();

        let est = intrinsics_from_homographies(&hs).expect("solvable");
        assert_relative_eq!(est[(0, 0)], 800.0, max_relative = 1e-6);
        assert_relative_eq!(est[(1, 1)], 780.0, max_relative = 1e-6);
        assert_relative_eq!(est[(0, 2)], 320.0, max_relative = 1e-5);
        assert_relative_eq!(est[(1, 2)], 240.0, max_relative = 1e-5);
    }

    #[test]
    fn recovers_pose_from_homography() {
        let k = known_k();
        let rot = Rotation3::from_euler_angles(0.1, -0.2, 0.3);
        let t = Vector3::new(0.05, -0.02, 0.9);
        let h = homography_for_pose(&k, &rot, &t);

        let (rvec, t_est) = extrinsics_from_homography(&k, &h).expect("pose");
        assert_relative_eq!((t_est - t).norm(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(
            (rvec - rot.scaled_axis()).norm(),
            0.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn too_few_homographies_rejected() {
        let hs = vec![Matrix3::identity(); 2];
        assert!(intrinsics_from_homographies(&hs).is_err());
    }
}
