//! Planar calibration board geometry.

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Interior-corner layout of a planar checkerboard.
///
/// `rows × cols` counts *interior* corners, not squares. The layout is
/// fixed for the lifetime of a calibration session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSpec {
    pub rows: usize,
    pub cols: usize,
    /// Square edge length in meters. Must be positive.
    pub square_edge_m: f64,
}

impl BoardSpec {
    pub fn new(rows: usize, cols: usize, square_edge_m: f64) -> Self {
        Self {
            rows,
            cols,
            square_edge_m,
        }
    }

    /// Total interior corner count.
    #[inline]
    pub fn corner_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Reference 3D layout of the board, raster order.
    ///
    /// The corner at row `r`, column `c` sits at
    /// `(c * edge, r * edge, 0)`; the board plane is `Z = 0`.
    pub fn world_points(&self) -> Vec<Point3<f64>> {
        let mut points = Vec::with_capacity(self.corner_count());
        for r in 0..self.rows {
            for c in 0..self.cols {
                points.push(Point3::new(
                    c as f64 * self.square_edge_m,
                    r as f64 * self.square_edge_m,
                    0.0,
                ));
            }
        }
        points
    }
}

/// One accepted corner extraction: 2D image points in raster order,
/// index-aligned with [`BoardSpec::world_points`].
///
/// Produced by the corner extractor, consumed once by the calibration
/// solver, then discardable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub points: Vec<Point2<f32>>,
}

impl CalibrationSample {
    /// Whether the sample carries one point per board corner.
    #[inline]
    pub fn matches(&self, board: &BoardSpec) -> bool {
        self.points.len() == board.corner_count()
    }
}
