//! Sample accumulation and the solve gate.

use log::{debug, info};

use tagpose_chessboard::{extract_corners, ExtractorParams};
use tagpose_core::{BoardSpec, CalibrationSample, GrayImageView};

use crate::solve::{solve, SolvedCalibration};
use crate::types::CalibrationError;

/// Minimum accepted views before a solve is attempted. Fewer views leave
/// the conic system too poorly conditioned to trust.
pub const MIN_SAMPLES: usize = 15;

/// Accumulates checkerboard detections frame by frame and solves once
/// enough of them are in.
pub struct CaptureSession {
    board: BoardSpec,
    params: ExtractorParams,
    min_samples: usize,
    samples: Vec<CalibrationSample>,
}

impl CaptureSession {
    pub fn new(board: BoardSpec) -> Self {
        Self::with_params(board, ExtractorParams::default())
    }

    pub fn with_params(board: BoardSpec, params: ExtractorParams) -> Self {
        Self {
            board,
            params,
            min_samples: MIN_SAMPLES,
            samples: Vec::new(),
        }
    }

    /// Override the solve gate. Mostly useful in tests and controlled
    /// rigs; production stays at [`MIN_SAMPLES`].
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn board(&self) -> &BoardSpec {
        &self.board
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_ready(&self) -> bool {
        self.samples.len() >= self.min_samples
    }

    /// Run corner extraction on one frame; keep the sample when the full
    /// grid was found. Returns whether the frame contributed.
    pub fn observe(&mut self, frame: &GrayImageView<'_>) -> bool {
        match extract_corners(frame, &self.board, &self.params) {
            Some(sample) => {
                self.samples.push(sample);
                info!(
                    "calibration sample accepted ({}/{})",
                    self.samples.len(),
                    self.min_samples
                );
                true
            }
            None => {
                debug!("frame rejected: full grid not found");
                false
            }
        }
    }

    /// Add an already-extracted sample, bypassing detection.
    pub fn push_sample(&mut self, sample: CalibrationSample) {
        self.samples.push(sample);
    }

    /// Solve if the gate is met. `None` below the gate; the solver itself
    /// is never invoked on an under-filled session.
    pub fn try_solve(&self) -> Option<Result<SolvedCalibration, CalibrationError>> {
        if !self.is_ready() {
            debug!(
                "solve deferred: {} of {} samples",
                self.samples.len(),
                self.min_samples
            );
            return None;
        }
        Some(solve(&self.samples, &self.board))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Point2, Rotation3, Vector3};

    use crate::types::{CameraCalibration, DIST_COEFFS};

    fn synthetic_sample(board: &BoardSpec, seed: usize) -> CalibrationSample {
        let calib = CameraCalibration::new(
            Matrix3::new(800.0, 0.0, 320.0, 0.0, 780.0, 240.0, 0.0, 0.0, 1.0),
            vec![0.0; DIST_COEFFS],
        );
        let t = seed as f64;
        let rot = Rotation3::from_euler_angles(0.2 * (0.6 * t).sin(), 0.25 * t.cos(), 0.1 * t);
        let rvec = rot.scaled_axis();
        let tvec = Vector3::new(-0.1, -0.06, 0.6 + 0.01 * t);
        let points = board
            .world_points()
            .iter()
            .map(|pw| {
                let p = calib.project_world(pw, &rvec, &tvec).expect("in front");
                Point2::new(p.x as f32, p.y as f32)
            })
            .collect();
        CalibrationSample { points }
    }

    #[test]
    fn solve_gated_until_min_samples() {
        let board = BoardSpec::new(6, 9, 0.026);
        let mut session = CaptureSession::new(board.clone());
        assert_eq!(session.sample_count(), 0);

        for i in 0..MIN_SAMPLES - 1 {
            session.push_sample(synthetic_sample(&board, i));
            assert!(!session.is_ready());
            assert!(session.try_solve().is_none());
        }

        session.push_sample(synthetic_sample(&board, MIN_SAMPLES - 1));
        assert!(session.is_ready());
        let solved = session.try_solve().expect("gate met").expect("solvable");
        assert!(solved.rms_reprojection_px < 0.5);
    }

    #[test]
    fn lowered_gate_applies() {
        let board = BoardSpec::new(6, 9, 0.026);
        let mut session = CaptureSession::new(board.clone()).with_min_samples(3);
        for i in 0..3 {
            session.push_sample(synthetic_sample(&board, i));
        }
        assert!(session.try_solve().is_some());
    }

    #[test]
    fn blank_frame_does_not_contribute() {
        let board = BoardSpec::new(6, 9, 0.026);
        let mut session = CaptureSession::new(board);
        let data = vec![128u8; 64 * 64];
        let frame = GrayImageView {
            width: 64,
            height: 64,
            data: &data,
        };
        assert!(!session.observe(&frame));
        assert_eq!(session.sample_count(), 0);
    }
}
