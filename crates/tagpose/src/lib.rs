//! High-level facade for the `tagpose-*` workspace.
//!
//! Re-exports the underlying crates under short module names, plus the
//! session config and the file-backed frame source used by the CLI.
//!
//! ## Quickstart
//!
//! ```no_run
//! use tagpose::{gray_view, SessionConfig};
//! use tagpose::chessboard::extract_corners;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = SessionConfig::default();
//! let img = image::open("board.png")?.to_luma8();
//! let sample = extract_corners(&gray_view(&img), &cfg.board(), &cfg.extractor);
//! println!("full grid found: {}", sample.is_some());
//! # Ok(())
//! # }
//! ```

pub use tagpose_aruco as aruco;
pub use tagpose_calib as calib;
pub use tagpose_chessboard as chessboard;
pub use tagpose_core as core;
pub use tagpose_tracker as tracker;

mod config;
mod frames;

pub use config::{ConfigError, SessionConfig};
pub use frames::{load_gray, ImageDirSource};

pub use tagpose_aruco::{Dictionary, Matcher};
pub use tagpose_calib::{CameraCalibration, CaptureSession};
pub use tagpose_core::BoardSpec;
pub use tagpose_tracker::{RelativePose, TrackerConfig, TrackingSummary};

/// Borrow an `image::GrayImage` as the core crate's view type.
pub fn gray_view(img: &::image::GrayImage) -> tagpose_core::GrayImageView<'_> {
    tagpose_core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}
