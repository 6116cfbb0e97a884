//! The pull-based tracking loop.
//!
//! Single-threaded: each iteration pulls one frame from the source, runs
//! detection, pose estimation, and the relative-pose transform, then hands
//! the result to the sink. The sink decides when to stop; the loop also
//! ends when the source runs dry. A failing source is fatal.

use log::{debug, info};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use tagpose_aruco::{detect_markers, DetectorParams, Matcher};
use tagpose_calib::CameraCalibration;
use tagpose_core::GrayImage;

use crate::pose::estimate_poses;
use crate::relative::{compute_relative, RelativePose};

/// Errors from a tracking session run.
#[derive(thiserror::Error, Debug)]
pub enum TrackError {
    #[error("frame source failed: {0}")]
    Source(String),
}

/// Pull-based frame supplier.
pub trait FrameSource {
    /// Next grayscale frame, `Ok(None)` at end of stream. An `Err` on the
    /// first call means the source never started (missing device, bad
    /// directory) and aborts the session.
    fn next_frame(&mut self) -> Result<Option<GrayImage>, TrackError>;
}

/// Per-frame consumer of tracking output.
pub trait TrackSink {
    /// Receives each frame's result (`None` when either id was missing).
    /// Return `false` to stop the session.
    fn on_frame(&mut self, frame_index: usize, relative: Option<&RelativePose>) -> bool;
}

/// Static configuration of one tracking run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub base_id: u32,
    pub target_id: u32,
    /// Physical marker edge length, meters.
    pub marker_edge_m: f64,
    pub detector: DetectorParams,
}

/// What the session saw, reported once at the end.
#[derive(Clone, Debug)]
pub struct TrackingSummary {
    pub frames: usize,
    pub frames_with_pose: usize,
    /// Last computed relative pose, if any frame produced one.
    pub last: Option<RelativePose>,
}

impl TrackingSummary {
    /// Rotation matrix of the last delta vector, the end-of-run dump.
    pub fn final_rotation_matrix(&self) -> Option<Matrix3<f64>> {
        self.last.as_ref().map(RelativePose::rotation_delta_matrix)
    }
}

/// Run the tracking loop to completion (source exhausted or sink stop).
pub fn run_tracking<S: FrameSource, K: TrackSink>(
    source: &mut S,
    sink: &mut K,
    matcher: &Matcher,
    calibration: &CameraCalibration,
    config: &TrackerConfig,
) -> Result<TrackingSummary, TrackError> {
    let mut summary = TrackingSummary {
        frames: 0,
        frames_with_pose: 0,
        last: None,
    };

    info!(
        "tracking markers {} -> {} (edge {} m)",
        config.base_id, config.target_id, config.marker_edge_m
    );

    while let Some(frame) = source.next_frame()? {
        let observations = detect_markers(&frame.view(), matcher, &config.detector);
        let poses = estimate_poses(&observations, config.marker_edge_m, calibration);
        let relative = compute_relative(config.base_id, config.target_id, &poses);

        summary.frames += 1;
        if let Some(rel) = relative {
            summary.frames_with_pose += 1;
            summary.last = Some(rel);
            debug!(
                "frame {}: relative translation {:?}",
                summary.frames - 1,
                rel.translation
            );
        } else {
            debug!("frame {}: pair not visible", summary.frames - 1);
        }

        if !sink.on_frame(summary.frames - 1, relative.as_ref()) {
            info!("sink requested stop after frame {}", summary.frames - 1);
            break;
        }
    }

    info!(
        "tracking done: {} frames, {} with relative pose",
        summary.frames, summary.frames_with_pose
    );
    Ok(summary)
}
