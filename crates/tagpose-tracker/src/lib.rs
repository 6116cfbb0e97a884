//! Marker pose estimation and relative-pose tracking.
//!
//! Builds on the detector crate: observed marker quads become 6DoF poses
//! via a planar solve, and two tracked ids reduce to one relative pose per
//! frame, expressed in the base marker's axes. The session module runs the
//! whole online flow over a pluggable frame source.

mod pose;
mod relative;
mod session;

pub use pose::{estimate_pose, estimate_poses, PoseEstimate};
pub use relative::{compute_relative, RelativePose};
pub use session::{
    run_tracking, FrameSource, TrackError, TrackSink, TrackerConfig, TrackingSummary,
};
