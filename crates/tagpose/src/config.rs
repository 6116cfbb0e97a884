//! Session configuration file.
//!
//! One JSON document carries everything a calibration or tracking session
//! needs; every field has a default matching the reference rig, so an
//! empty `{}` config is a valid starting point.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use tagpose_aruco::DetectorParams;
use tagpose_chessboard::ExtractorParams;
use tagpose_core::BoardSpec;

/// Errors from reading or writing a config file.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown dictionary name: {0}")]
    UnknownDictionary(String),
}

/// Everything configurable about a capture/tracking session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interior corner rows of the calibration checkerboard.
    pub board_rows: usize,
    /// Interior corner columns.
    pub board_cols: usize,
    /// Checkerboard square edge, meters.
    pub square_edge_m: f64,
    /// Marker dictionary name.
    pub dictionary: String,
    /// Physical marker edge, meters.
    pub marker_edge_m: f64,
    /// Minimum accepted calibration samples before solving.
    pub min_samples: usize,
    /// Capture pacing hint for live frame sources, frames per second.
    pub fps: u32,
    /// Hamming budget for dictionary matching.
    pub max_hamming: u8,
    pub extractor: ExtractorParams,
    pub detector: DetectorParams,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            board_rows: 6,
            board_cols: 9,
            square_edge_m: 0.026,
            dictionary: "ARUCO_5X5_50".to_string(),
            marker_edge_m: 0.0661,
            min_samples: 15,
            fps: 5,
            max_hamming: 2,
            extractor: ExtractorParams::default(),
            detector: DetectorParams::default(),
        }
    }
}

impl SessionConfig {
    pub fn board(&self) -> BoardSpec {
        BoardSpec::new(self.board_rows, self.board_cols, self.square_edge_m)
    }

    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Resolve the configured dictionary name.
    pub fn dictionary(&self) -> Result<tagpose_aruco::Dictionary, ConfigError> {
        tagpose_aruco::Dictionary::by_name(&self.dictionary)
            .ok_or_else(|| ConfigError::UnknownDictionary(self.dictionary.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_rig() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.board_rows, 6);
        assert_eq!(cfg.board_cols, 9);
        assert_eq!(cfg.square_edge_m, 0.026);
        assert_eq!(cfg.marker_edge_m, 0.0661);
        assert_eq!(cfg.min_samples, 15);
        assert_eq!(cfg.fps, 5);
        assert_eq!(cfg.board().corner_count(), 54);
        assert!(cfg.dictionary().is_ok());
    }

    #[test]
    fn empty_document_parses_to_defaults() {
        let cfg: SessionConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(cfg.dictionary, "ARUCO_5X5_50");
    }

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        let mut cfg = SessionConfig::default();
        cfg.marker_edge_m = 0.08;
        cfg.write_json(&path).expect("write");
        let loaded = SessionConfig::load_json(&path).expect("load");
        assert_eq!(loaded.marker_edge_m, 0.08);
    }

    #[test]
    fn unknown_dictionary_is_an_error() {
        let mut cfg = SessionConfig::default();
        cfg.dictionary = "NOPE".to_string();
        assert!(matches!(
            cfg.dictionary(),
            Err(ConfigError::UnknownDictionary(_))
        ));
    }
}
