//! Joint nonlinear refinement of the calibration.
//!
//! One parameter vector carries the intrinsics, the distortion
//! coefficients, and one pose per sample:
//!
//! `[fx, fy, cx, cy, k1, k2, p1, p2, k3, (rvec, tvec) * n]`
//!
//! Levenberg-Marquardt minimizes the stacked reprojection residuals with
//! forward-difference Jacobians. Steps are only ever accepted when they
//! reduce the cost, so the refinement cannot leave the closed-form
//! initialization worse than it found it. Per-sample poses are a solver
//! byproduct and are not returned.

use log::{debug, info};
use nalgebra::{DMatrix, DVector, Matrix3, Point3, Vector3};

use tagpose_core::{BoardSpec, CalibrationSample};

use crate::linear::{extrinsics_from_homography, intrinsics_from_homographies, sample_homography};
use crate::types::{CalibrationError, CameraCalibration, DIST_COEFFS};

const INTRINSIC_PARAMS: usize = 4 + DIST_COEFFS;
const MAX_ITERATIONS: usize = 40;
const MAX_DAMPING_RETRIES: usize = 8;

/// Solver output: the calibration plus its final fit quality.
#[derive(Clone, Debug)]
pub struct SolvedCalibration {
    pub calibration: CameraCalibration,
    /// Root-mean-square reprojection error over all points, in pixels.
    pub rms_reprojection_px: f64,
}

/// Fit intrinsics and distortion to the accumulated samples.
///
/// Fails with [`CalibrationError::InsufficientSamples`] when `samples` is
/// empty. The 15-sample conditioning floor is the *caller's* gate (see
/// [`crate::CaptureSession`]); this function does not re-check it.
pub fn solve(
    samples: &[CalibrationSample],
    board: &BoardSpec,
) -> Result<SolvedCalibration, CalibrationError> {
    if samples.is_empty() {
        return Err(CalibrationError::InsufficientSamples);
    }
    let expected = board.corner_count();
    for (i, sample) in samples.iter().enumerate() {
        if sample.points.len() != expected {
            return Err(CalibrationError::SampleSizeMismatch {
                sample: i,
                expected,
                got: sample.points.len(),
            });
        }
    }

    // The board is rigid and planar: one world-point array per sample,
    // identical geometry replicated.
    let world = board.world_points();

    let homographies: Vec<Matrix3<f64>> = samples
        .iter()
        .map(|s| sample_homography(s, board))
        .collect::<Result<_, _>>()?;

    let k0 = intrinsics_from_homographies(&homographies)?;
    let mut params = DVector::<f64>::zeros(INTRINSIC_PARAMS + 6 * samples.len());
    params[0] = k0[(0, 0)];
    params[1] = k0[(1, 1)];
    params[2] = k0[(0, 2)];
    params[3] = k0[(1, 2)];
    for (i, h) in homographies.iter().enumerate() {
        let (rvec, tvec) = extrinsics_from_homography(&k0, h)?;
        let base = INTRINSIC_PARAMS + 6 * i;
        for a in 0..3 {
            params[base + a] = rvec[a];
            params[base + 3 + a] = tvec[a];
        }
    }

    let observations: Vec<Vec<(f64, f64)>> = samples
        .iter()
        .map(|s| s.points.iter().map(|p| (p.x as f64, p.y as f64)).collect())
        .collect();

    let residuals = |p: &DVector<f64>| residual_vector(p, &world, &observations);

    let mut r = residuals(&params).ok_or(CalibrationError::Degenerate(
        "initialization projects behind the camera",
    ))?;
    let mut cost = r.norm_squared();
    let mut lambda = 1e-3;

    for iter in 0..MAX_ITERATIONS {
        let j = numeric_jacobian(&residuals, &params, &r)
            .ok_or(CalibrationError::Degenerate("Jacobian evaluation failed"))?;
        let jt = j.transpose();
        let h = &jt * &j;
        let g = &jt * &r;

        let mut improved = false;
        for _ in 0..MAX_DAMPING_RETRIES {
            let mut damped = h.clone();
            for d in 0..damped.nrows() {
                damped[(d, d)] += lambda * damped[(d, d)].max(1e-12);
            }
            let Some(delta) = damped.lu().solve(&g) else {
                lambda *= 10.0;
                continue;
            };
            let candidate = &params - &delta;
            let Some(r_new) = residuals(&candidate) else {
                lambda *= 10.0;
                continue;
            };
            let cost_new = r_new.norm_squared();
            if cost_new < cost {
                let rel_drop = (cost - cost_new) / cost.max(1e-300);
                params = candidate;
                r = r_new;
                cost = cost_new;
                lambda = (lambda * 0.5).max(1e-12);
                improved = true;
                if rel_drop < 1e-12 {
                    debug!("LM converged after {} iterations", iter + 1);
                    return finish(&params, &observations, cost);
                }
                break;
            }
            lambda *= 10.0;
        }

        if !improved {
            debug!("LM stalled after {} iterations", iter + 1);
            break;
        }
    }

    finish(&params, &observations, cost)
}

fn finish(
    params: &DVector<f64>,
    observations: &[Vec<(f64, f64)>],
    cost: f64,
) -> Result<SolvedCalibration, CalibrationError> {
    let calibration = calibration_from_params(params);
    if !(calibration.fx() > 0.0 && calibration.fy() > 0.0) {
        return Err(CalibrationError::Degenerate("non-positive focal length"));
    }

    let n_points: usize = observations.iter().map(Vec::len).sum();
    let rms = (cost / (n_points as f64)).sqrt();
    info!(
        "calibration solved: fx={:.2} fy={:.2} cx={:.2} cy={:.2}, rms={:.4}px",
        calibration.fx(),
        calibration.fy(),
        calibration.cx(),
        calibration.cy(),
        rms
    );
    Ok(SolvedCalibration {
        calibration,
        rms_reprojection_px: rms,
    })
}

fn calibration_from_params(p: &DVector<f64>) -> CameraCalibration {
    let k = Matrix3::new(p[0], 0.0, p[2], 0.0, p[1], p[3], 0.0, 0.0, 1.0);
    CameraCalibration::new(k, p.as_slice()[4..4 + DIST_COEFFS].to_vec())
}

/// Stack all reprojection residuals. `None` when any point lands behind
/// the camera, which makes the parameter vector inadmissible.
fn residual_vector(
    p: &DVector<f64>,
    world: &[Point3<f64>],
    observations: &[Vec<(f64, f64)>],
) -> Option<DVector<f64>> {
    let calibration = calibration_from_params(p);
    let n_points: usize = observations.iter().map(Vec::len).sum();
    let mut r = DVector::<f64>::zeros(2 * n_points);

    let mut row = 0;
    for (i, obs) in observations.iter().enumerate() {
        let base = INTRINSIC_PARAMS + 6 * i;
        let rvec = Vector3::new(p[base], p[base + 1], p[base + 2]);
        let tvec = Vector3::new(p[base + 3], p[base + 4], p[base + 5]);
        for (pw, &(u, v)) in world.iter().zip(obs.iter()) {
            let proj = calibration.project_world(pw, &rvec, &tvec)?;
            r[row] = proj.x - u;
            r[row + 1] = proj.y - v;
            row += 2;
        }
    }
    Some(r)
}

fn numeric_jacobian<F>(f: &F, p: &DVector<f64>, r0: &DVector<f64>) -> Option<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> Option<DVector<f64>>,
{
    let mut j = DMatrix::<f64>::zeros(r0.len(), p.len());
    for c in 0..p.len() {
        let eps = 1e-6 * p[c].abs().max(1.0);
        let mut perturbed = p.clone();
        perturbed[c] += eps;
        let r1 = f(&perturbed)?;
        for row in 0..r0.len() {
            j[(row, c)] = (r1[row] - r0[row]) / eps;
        }
    }
    Some(j)
}
