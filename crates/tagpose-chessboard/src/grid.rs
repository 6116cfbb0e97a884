//! Grid organization: candidates -> complete raster-ordered corner grid.
//!
//! A homography seeded from the four extreme candidates maps unit grid
//! coordinates into the image. Every expected interior node must then snap
//! uniquely to a nearby candidate, otherwise the whole attempt is
//! rejected. All four 90-degree orientations of the seed quad are tried, so
//! the caller never has to care how the board is rotated in the frame.

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point2;

use tagpose_core::homography_from_4pt;

use crate::params::ExtractorParams;

/// Indices of the four extreme candidates, in TL, TR, BR, BL order for an
/// axis-ish-aligned board.
fn extreme_corners(candidates: &[Point2<f32>]) -> [usize; 4] {
    let mut tl = 0;
    let mut tr = 0;
    let mut br = 0;
    let mut bl = 0;
    for (i, p) in candidates.iter().enumerate() {
        let sum = p.x + p.y;
        let diff = p.x - p.y;
        if sum < candidates[tl].x + candidates[tl].y {
            tl = i;
        }
        if sum > candidates[br].x + candidates[br].y {
            br = i;
        }
        if diff > candidates[tr].x - candidates[tr].y {
            tr = i;
        }
        if diff < candidates[bl].x - candidates[bl].y {
            bl = i;
        }
    }
    [tl, tr, br, bl]
}

fn snap_grid(
    candidates: &[Point2<f32>],
    tree: &KdTree<f32, 2>,
    quad: &[Point2<f32>; 4],
    rows: usize,
    cols: usize,
    tol_frac: f32,
) -> Option<Vec<Point2<f32>>> {
    let unit = [
        Point2::new(0.0f32, 0.0),
        Point2::new(cols as f32 - 1.0, 0.0),
        Point2::new(cols as f32 - 1.0, rows as f32 - 1.0),
        Point2::new(0.0, rows as f32 - 1.0),
    ];
    let h = homography_from_4pt(&unit, quad)?;

    // Spacing estimate from the seed homography at the board origin.
    let origin = h.apply(unit[0]);
    let step_c = (h.apply(Point2::new(1.0, 0.0)) - origin).norm();
    let step_r = (h.apply(Point2::new(0.0, 1.0)) - origin).norm();
    let tolerance = tol_frac * step_c.min(step_r);
    if !(tolerance > 0.0) {
        return None;
    }
    let tol_sq = tolerance * tolerance;

    let mut used = vec![false; candidates.len()];
    let mut grid = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let predicted = h.apply(Point2::new(c as f32, r as f32));
            let nearest = tree.nearest_one::<SquaredEuclidean>(&[predicted.x, predicted.y]);
            let idx = nearest.item as usize;
            if nearest.distance > tol_sq || used[idx] {
                return None;
            }
            used[idx] = true;
            grid.push(candidates[idx]);
        }
    }
    Some(grid)
}

/// Organize corner candidates into a complete `rows × cols` raster grid.
///
/// Returns `None` unless every expected node is matched by a distinct
/// candidate; partial grids are never returned.
pub fn organize_grid(
    candidates: &[Point2<f32>],
    rows: usize,
    cols: usize,
    params: &ExtractorParams,
) -> Option<Vec<Point2<f32>>> {
    if rows < 2 || cols < 2 || candidates.len() < rows * cols {
        return None;
    }

    let coords: Vec<[f32; 2]> = candidates.iter().map(|p| [p.x, p.y]).collect();
    let tree: KdTree<f32, 2> = (&coords).into();

    let ext = extreme_corners(candidates);
    let base = [
        candidates[ext[0]],
        candidates[ext[1]],
        candidates[ext[2]],
        candidates[ext[3]],
    ];

    // Try the seed quad in all four rotations; a rotated board swaps the
    // roles of rows and columns, which the homography absorbs.
    for rot in 0..4 {
        let quad = [
            base[rot % 4],
            base[(rot + 1) % 4],
            base[(rot + 2) % 4],
            base[(rot + 3) % 4],
        ];
        if let Some(grid) = snap_grid(candidates, &tree, &quad, rows, cols, params.snap_tol_frac) {
            return Some(grid);
        }
    }
    None
}
