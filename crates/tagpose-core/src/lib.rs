//! Core geometry and image utilities for camera calibration and marker
//! tracking.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete detector, frame source, or image-decoding crate.

mod board;
mod homography;
mod image;
mod logger;
mod rotation;

pub use board::{BoardSpec, CalibrationSample};
pub use homography::{
    estimate_homography, homography_from_4pt, warp_perspective_gray, Homography,
};
pub use image::{
    adaptive_threshold, integral_image, normalize_contrast, sample_bilinear, sample_bilinear_u8,
    GrayImage, GrayImageView,
};
pub use logger::init_with_level;
pub use rotation::{rotation_from_rvec, rvec_from_rotation};
