//! Square fiducial marker detection.
//!
//! A frame goes through adaptive thresholding, connected-component quad
//! extraction, and per-quad bit decoding against a marker dictionary.
//! Detections carry canonically ordered image corners, ready for pose
//! estimation.

mod decode;
mod detect;
mod dictionary;
mod matcher;
mod render;

pub use decode::{decode_quad, DecodedMarker};
pub use detect::{detect_markers, DetectorParams, MarkerObservation};
pub use dictionary::Dictionary;
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use render::render_marker;
