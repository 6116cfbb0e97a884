//! Full-frame marker detection.
//!
//! Candidate quads come from the dark connected components of an
//! adaptively thresholded frame: each component's convex hull is reduced
//! to its four extreme corners, and the quad is handed to the bit decoder.
//! Every decoded quad is reported; when the same id appears on several
//! quads (duplicate printouts in view), all of them are kept and callers
//! decide which one to trust.

use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use tagpose_core::{adaptive_threshold, normalize_contrast, GrayImageView};

use crate::decode::{decode_quad, DecodedMarker};
use crate::matcher::Matcher;

/// Tuning knobs for the marker detector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorParams {
    /// Adaptive-threshold window radius as a fraction of the larger frame
    /// dimension.
    pub threshold_radius_frac: f32,
    /// Adaptive-threshold offset (higher pushes ambiguous pixels to black).
    pub threshold_offset: i16,
    /// Reject components smaller than this many pixels.
    pub min_area: usize,
    /// Reject components covering more than this fraction of the frame.
    pub max_area_frac: f32,
    /// Reject quads with any side shorter than this, in pixels.
    pub min_side_px: f32,
    /// Border ring width in cells.
    pub border_bits: usize,
    /// Minimum fraction of border cells reading black.
    pub min_border_score: f32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            threshold_radius_frac: 0.0625,
            threshold_offset: 4,
            min_area: 100,
            max_area_frac: 0.25,
            min_side_px: 10.0,
            border_bits: 1,
            min_border_score: 0.8,
        }
    }
}

/// One detected marker in a frame.
#[derive(Clone, Copy, Debug)]
pub struct MarkerObservation {
    pub id: u32,
    /// Image corners in the pattern's canonical TL, TR, BR, BL order.
    pub corners: [Point2<f32>; 4],
    pub hamming: u8,
    pub border_score: f32,
}

impl From<DecodedMarker> for MarkerObservation {
    fn from(d: DecodedMarker) -> Self {
        Self {
            id: d.id,
            corners: d.corners,
            hamming: d.hamming,
            border_score: d.border_score,
        }
    }
}

/// Detect all markers in a frame. Duplicate ids are all reported.
pub fn detect_markers(
    frame: &GrayImageView<'_>,
    matcher: &Matcher,
    params: &DetectorParams,
) -> Vec<MarkerObservation> {
    let normalized = normalize_contrast(frame);
    let radius = ((frame.width.max(frame.height) as f32 * params.threshold_radius_frac) as usize)
        .max(2);
    let binary = adaptive_threshold(&normalized.view(), radius, params.threshold_offset);

    let max_area = ((frame.width * frame.height) as f32 * params.max_area_frac) as usize;
    let components = dark_components(&binary.view(), params.min_area, max_area);
    debug!("{} candidate components", components.len());

    let mut out = Vec::new();
    for comp in &components {
        let hull = convex_hull(&comp.extremes);
        let Some(quad) = quad_from_hull(&hull, params.min_side_px) else {
            continue;
        };
        if let Some(decoded) = decode_quad(
            &normalized.view(),
            &quad,
            params.border_bits,
            params.min_border_score,
            matcher,
        ) {
            out.push(decoded.into());
        }
    }
    debug!("{} markers decoded", out.len());
    out
}

struct Component {
    /// Leftmost/rightmost pixel per occupied row; enough for the hull.
    extremes: Vec<Point2<f32>>,
}

/// 8-connected components of dark (0) pixels. Components touching the
/// frame edge are discarded: their quads are clipped and undecodable.
fn dark_components(binary: &GrayImageView<'_>, min_area: usize, max_area: usize) -> Vec<Component> {
    let w = binary.width;
    let h = binary.height;
    let mut visited = vec![false; w * h];
    let mut components = Vec::new();
    let mut stack = Vec::new();

    for start in 0..w * h {
        if visited[start] || binary.data[start] != 0 {
            continue;
        }

        let mut area = 0usize;
        let mut touches_edge = false;
        // row index -> (min x, max x)
        let mut rows: Vec<(usize, usize, usize)> = Vec::new();

        visited[start] = true;
        stack.push(start);
        while let Some(idx) = stack.pop() {
            let x = idx % w;
            let y = idx / w;
            area += 1;
            if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
                touches_edge = true;
            }
            match rows.iter_mut().find(|(ry, _, _)| *ry == y) {
                Some((_, minx, maxx)) => {
                    *minx = (*minx).min(x);
                    *maxx = (*maxx).max(x);
                }
                None => rows.push((y, x, x)),
            }

            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    if !visited[nidx] && binary.data[nidx] == 0 {
                        visited[nidx] = true;
                        stack.push(nidx);
                    }
                }
            }
        }

        if touches_edge || area < min_area || area > max_area {
            continue;
        }
        let mut extremes = Vec::with_capacity(rows.len() * 2);
        for (y, minx, maxx) in rows {
            extremes.push(Point2::new(minx as f32, y as f32));
            if maxx != minx {
                extremes.push(Point2::new(maxx as f32, y as f32));
            }
        }
        components.push(Component { extremes });
    }

    components
}

#[inline]
fn cross(o: &Point2<f32>, a: &Point2<f32>, b: &Point2<f32>) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Monotone-chain convex hull.
fn convex_hull(points: &[Point2<f32>]) -> Vec<Point2<f32>> {
    let mut pts: Vec<Point2<f32>> = points.to_vec();
    pts.sort_by(|a, b| (a.x, a.y).partial_cmp(&(b.x, b.y)).unwrap_or(std::cmp::Ordering::Equal));
    pts.dedup_by(|a, b| a.x == b.x && a.y == b.y);
    let n = pts.len();
    if n < 3 {
        return pts;
    }

    let mut hull: Vec<Point2<f32>> = Vec::with_capacity(2 * n);
    for p in pts.iter().chain(pts.iter().rev().skip(1)) {
        while hull.len() >= 2
            && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop(); // closing point repeats the first
    hull
}

/// Reduce a convex hull to its four extreme corners: the farthest pair
/// forms a diagonal, and the most-offset point on each side of that
/// diagonal completes the quad. Corners come back in TL, TR, BR, BL
/// winding (screen coordinates, y down).
fn quad_from_hull(hull: &[Point2<f32>], min_side_px: f32) -> Option<[Point2<f32>; 4]> {
    if hull.len() < 4 {
        return None;
    }

    let mut a = 0;
    let mut b = 0;
    let mut best = 0.0f32;
    for i in 0..hull.len() {
        for j in (i + 1)..hull.len() {
            let d = (hull[i] - hull[j]).norm_squared();
            if d > best {
                best = d;
                a = i;
                b = j;
            }
        }
    }

    let mut c: Option<(usize, f32)> = None;
    let mut d: Option<(usize, f32)> = None;
    for (i, p) in hull.iter().enumerate() {
        if i == a || i == b {
            continue;
        }
        let s = cross(&hull[a], &hull[b], p);
        if s > 0.0 && c.map(|(_, v)| s > v).unwrap_or(true) {
            c = Some((i, s));
        } else if s < 0.0 && d.map(|(_, v)| s < v).unwrap_or(true) {
            d = Some((i, s));
        }
    }
    let (c, _) = c?;
    let (d, _) = d?;

    let mut quad = [hull[a], hull[c], hull[b], hull[d]];

    // Order clockwise on screen starting from the top-left-most corner.
    let cx = quad.iter().map(|p| p.x).sum::<f32>() / 4.0;
    let cy = quad.iter().map(|p| p.y).sum::<f32>() / 4.0;
    quad.sort_by(|p, q| {
        let ap = (p.y - cy).atan2(p.x - cx);
        let aq = (q.y - cy).atan2(q.x - cx);
        ap.partial_cmp(&aq).unwrap_or(std::cmp::Ordering::Equal)
    });

    for i in 0..4 {
        if ((quad[(i + 1) % 4]) - quad[i]).norm() < min_side_px {
            return None;
        }
    }
    Some(quad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;
    use crate::render::render_marker;
    use approx::assert_abs_diff_eq;
    use tagpose_core::GrayImage;

    /// Paste `src` into `dst` at `(ox, oy)`.
    fn blit(dst: &mut GrayImage, src: &GrayImage, ox: usize, oy: usize) {
        for y in 0..src.height {
            for x in 0..src.width {
                dst.data[(oy + y) * dst.width + ox + x] = src.data[y * src.width + x];
            }
        }
    }

    #[test]
    fn quad_from_square_hull_is_ordered() {
        let pts = vec![
            Point2::new(10.0, 10.0),
            Point2::new(50.0, 12.0),
            Point2::new(52.0, 48.0),
            Point2::new(12.0, 50.0),
            Point2::new(30.0, 9.0), // on the top edge, not a corner
        ];
        let hull = convex_hull(&pts);
        let quad = quad_from_hull(&hull, 5.0).expect("quad");
        assert_eq!(quad[0], Point2::new(10.0, 10.0));
        assert_eq!(quad[1], Point2::new(50.0, 12.0));
        assert_eq!(quad[2], Point2::new(52.0, 48.0));
        assert_eq!(quad[3], Point2::new(12.0, 50.0));
    }

    #[test]
    fn detects_rendered_marker_with_corners() {
        let dict = Dictionary::by_name("ARUCO_5X5_50").expect("builtin");
        let marker = render_marker(&dict, 7, 16, 0).expect("render"); // 112 px
        let matcher = Matcher::new(dict, 0);

        let mut canvas = GrayImage::new(256, 256, 255);
        blit(&mut canvas, &marker, 60, 40);

        let dets = detect_markers(&canvas.view(), &matcher, &DetectorParams::default());
        assert_eq!(dets.len(), 1);
        let det = &dets[0];
        assert_eq!(det.id, 7);
        assert_eq!(det.hamming, 0);

        // Outer border corners of the pasted marker, within pixel-level
        // precision of the binarized hull.
        let expected = [
            Point2::new(60.0, 40.0),
            Point2::new(171.0, 40.0),
            Point2::new(171.0, 151.0),
            Point2::new(60.0, 151.0),
        ];
        for (got, want) in det.corners.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 2.5);
        }
    }

    #[test]
    fn duplicate_markers_are_all_reported() {
        let dict = Dictionary::by_name("ARUCO_5X5_50").expect("builtin");
        let marker = render_marker(&dict, 3, 12, 0).expect("render"); // 84 px
        let matcher = Matcher::new(dict, 0);

        let mut canvas = GrayImage::new(320, 192, 255);
        blit(&mut canvas, &marker, 30, 50);
        blit(&mut canvas, &marker, 190, 50);

        let dets = detect_markers(&canvas.view(), &matcher, &DetectorParams::default());
        assert_eq!(dets.len(), 2);
        assert!(dets.iter().all(|d| d.id == 3));
    }

    #[test]
    fn blank_frame_detects_nothing() {
        let dict = Dictionary::by_name("ARUCO_5X5_50").expect("builtin");
        let matcher = Matcher::new(dict, 0);
        let canvas = GrayImage::new(128, 128, 200);
        assert!(detect_markers(&canvas.view(), &matcher, &DetectorParams::default()).is_empty());
    }
}
