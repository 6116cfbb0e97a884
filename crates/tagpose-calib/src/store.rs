//! Flat-text persistence for a solved calibration.
//!
//! The format is a bare list of numbers, one per line: the nine entries of
//! `K` in row-major order, followed by the distortion coefficients. There
//! is no header and no count field, so the reader must be told how many
//! coefficients to expect; a file written with a different coefficient
//! count parses silently into the wrong model. That fragility is a
//! property of the format itself and is deliberately left intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use nalgebra::Matrix3;

use crate::types::CameraCalibration;

/// Errors from reading or writing the calibration store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("calibration file not found: {0}")]
    NotFound(PathBuf),
    #[error("calibration store I/O: {0}")]
    Io(#[from] io::Error),
    #[error("malformed calibration file: {0}")]
    Format(String),
}

/// Write `K` (row-major) then the distortion coefficients, one value per
/// line.
pub fn save_calibration(path: &Path, calib: &CameraCalibration) -> Result<(), StoreError> {
    let mut out = String::new();
    for r in 0..3 {
        for c in 0..3 {
            out.push_str(&format!("{}\n", calib.k[(r, c)]));
        }
    }
    for d in &calib.dist {
        out.push_str(&format!("{d}\n"));
    }
    fs::write(path, out)?;
    info!("calibration saved to {}", path.display());
    Ok(())
}

/// Read a calibration back, expecting `dist_len` distortion coefficients
/// after the nine `K` entries. Trailing values beyond that are ignored,
/// matching the format's headerless, count-free nature.
pub fn load_calibration(path: &Path, dist_len: usize) -> Result<CameraCalibration, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let needed = 9 + dist_len;
    let mut values = Vec::with_capacity(needed);
    for (lineno, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if values.len() == needed {
            break;
        }
        let v: f64 = trimmed.parse().map_err(|_| {
            StoreError::Format(format!("line {}: not a number: {trimmed:?}", lineno + 1))
        })?;
        values.push(v);
    }
    if values.len() < needed {
        return Err(StoreError::Format(format!(
            "expected {needed} values, found {}",
            values.len()
        )));
    }

    let k = Matrix3::from_row_slice(&values[..9]);
    let dist = values[9..needed].to_vec();
    info!("calibration loaded from {}", path.display());
    Ok(CameraCalibration::new(k, dist))
}
