//! Offline frame source backed by a directory of image files.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use tagpose_core::GrayImage;
use tagpose_tracker::{FrameSource, TrackError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Pulls frames from image files in a directory, in filename order.
pub struct ImageDirSource {
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageDirSource {
    /// List the directory up front; an unreadable or empty directory is a
    /// startup failure.
    pub fn open(dir: &Path) -> Result<Self, TrackError> {
        let entries = fs::read_dir(dir)
            .map_err(|e| TrackError::Source(format!("cannot read {}: {e}", dir.display())))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(TrackError::Source(format!(
                "no image files in {}",
                dir.display()
            )));
        }
        Ok(Self { files, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Decode one file to a grayscale frame.
pub fn load_gray(path: &Path) -> Result<GrayImage, TrackError> {
    let img = image::open(path)
        .map_err(|e| TrackError::Source(format!("cannot decode {}: {e}", path.display())))?
        .to_luma8();
    Ok(GrayImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.into_raw(),
    })
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Result<Option<GrayImage>, TrackError> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        debug!("frame {}: {}", self.next - 1, path.display());
        load_gray(path).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_fails_at_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let absent = dir.path().join("nope");
        assert!(matches!(
            ImageDirSource::open(&absent),
            Err(TrackError::Source(_))
        ));
    }

    #[test]
    fn empty_directory_fails_at_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            ImageDirSource::open(dir.path()),
            Err(TrackError::Source(_))
        ));
    }

    #[test]
    fn reads_frames_in_filename_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.png", "a.png"] {
            let img = image::GrayImage::from_pixel(8, 6, image::Luma([128u8]));
            img.save(dir.path().join(name)).expect("save");
        }

        let mut source = ImageDirSource::open(dir.path()).expect("open");
        assert_eq!(source.len(), 2);
        let first = source.next_frame().expect("read").expect("frame");
        assert_eq!((first.width, first.height), (8, 6));
        assert!(source.next_frame().expect("read").is_some());
        assert!(source.next_frame().expect("read").is_none());
    }
}
