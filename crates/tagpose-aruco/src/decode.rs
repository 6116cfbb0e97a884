//! Bit decoding of a candidate quad.
//!
//! The quad interior is resampled on a `(bits + 2·border)²` cell lattice
//! through a four-point homography, each cell classified black or white
//! against an Otsu threshold over the cell means. The border ring must be
//! mostly black for the candidate to survive; the inner bits are then
//! matched against the dictionary in all four rotations, and the corner
//! list is rolled so index 0 is the marker's canonical top-left.

use nalgebra::Point2;

use tagpose_core::{homography_from_4pt, sample_bilinear, GrayImageView};

use crate::matcher::Matcher;

/// A marker successfully decoded from one quad.
#[derive(Clone, Copy, Debug)]
pub struct DecodedMarker {
    pub id: u32,
    /// Image corners in the marker's canonical order: TL, TR, BR, BL of
    /// the dictionary pattern.
    pub corners: [Point2<f32>; 4],
    pub hamming: u8,
    /// Fraction of border cells that read black.
    pub border_score: f32,
}

/// Otsu split point over the sampled cell means.
///
/// Degenerate inputs fall back without a histogram scan: a flat sample set
/// returns its value, and one with at most two occupied bins returns the
/// midpoint of its range.
fn otsu_split(samples: &[u8]) -> u8 {
    let (Some(&lo), Some(&hi)) = (samples.iter().min(), samples.iter().max()) else {
        return 127;
    };
    if lo == hi {
        return lo;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return lo.midpoint(hi);
    }

    let total = samples.len() as u32;
    let grand_sum: u64 = samples.iter().map(|&v| v as u64).sum();

    let mut below = 0u32;
    let mut below_sum = 0u64;
    let mut best = (f64::MIN, 127u8);
    for (t, &h) in hist.iter().enumerate() {
        below += h;
        below_sum += t as u64 * h as u64;
        if below == 0 {
            continue;
        }
        let above = total - below;
        if above == 0 {
            break;
        }
        let m_below = below_sum as f64 / below as f64;
        let m_above = (grand_sum - below_sum) as f64 / above as f64;
        let spread = m_below - m_above;
        let score = below as f64 * above as f64 * spread * spread;
        if score > best.0 {
            best = (score, t as u8);
        }
    }
    best.1
}

/// Mean of a 3x3 bilinear patch around `(x, y)`.
fn sample_patch_mean(img: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    let mut sum = 0.0f32;
    for dy in -1..=1 {
        for dx in -1..=1 {
            sum += sample_bilinear(img, x + dx as f32, y + dy as f32);
        }
    }
    (sum / 9.0).clamp(0.0, 255.0) as u8
}

/// Try to decode the marker inside `quad` (TL-first winding, any corner
/// may be the pattern's true top-left).
pub fn decode_quad(
    image: &GrayImageView<'_>,
    quad: &[Point2<f32>; 4],
    border_bits: usize,
    min_border_score: f32,
    matcher: &Matcher,
) -> Option<DecodedMarker> {
    let bits = matcher.dictionary().marker_size;
    let cells = bits + 2 * border_bits;
    if bits * bits > 64 || cells == 0 {
        return None;
    }

    // Unit cell lattice; the homography carries scale.
    let side = cells as f32;
    let canonical = [
        Point2::new(0.0, 0.0),
        Point2::new(side, 0.0),
        Point2::new(side, side),
        Point2::new(0.0, side),
    ];
    let h = homography_from_4pt(&canonical, quad)?;

    let mut means = Vec::with_capacity(cells * cells);
    for cy in 0..cells {
        for cx in 0..cells {
            let q = h.apply(Point2::new(cx as f32 + 0.5, cy as f32 + 0.5));
            if q.x < 1.0
                || q.y < 1.0
                || q.x >= (image.width as f32 - 2.0)
                || q.y >= (image.height as f32 - 2.0)
            {
                return None;
            }
            means.push(sample_patch_mean(image, q.x, q.y));
        }
    }

    let thr = otsu_split(&means);

    let mut border_ok = 0u32;
    let mut border_total = 0u32;
    let mut code = 0u64;
    for cy in 0..cells {
        for cx in 0..cells {
            let is_black = means[cy * cells + cx] < thr;
            let is_border = cx < border_bits
                || cy < border_bits
                || cx + border_bits >= cells
                || cy + border_bits >= cells;
            if is_border {
                border_total += 1;
                if is_black {
                    border_ok += 1;
                }
            } else if is_black {
                let idx = (cy - border_bits) * bits + (cx - border_bits);
                code |= 1u64 << idx;
            }
        }
    }

    let border_score = border_ok as f32 / border_total.max(1) as f32;
    if border_score < min_border_score {
        return None;
    }

    let m = matcher.match_code(code)?;
    // observed == rotate(dict, rot) means the given corner 0 sits
    // (4 - rot) quarter turns past the pattern's top-left; roll the list
    // forward by rot to undo it.
    let rot = m.rotation as usize;
    let corners = [
        quad[rot],
        quad[(1 + rot) % 4],
        quad[(2 + rot) % 4],
        quad[(3 + rot) % 4],
    ];

    Some(DecodedMarker {
        id: m.id,
        corners,
        hamming: m.hamming,
        border_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;
    use crate::render::render_marker;

    fn quad_of(x0: f32, y0: f32, side: f32) -> [Point2<f32>; 4] {
        [
            Point2::new(x0, y0),
            Point2::new(x0 + side, y0),
            Point2::new(x0 + side, y0 + side),
            Point2::new(x0, y0 + side),
        ]
    }

    #[test]
    fn decodes_rendered_marker() {
        let dict = Dictionary::by_name("ARUCO_5X5_50").expect("builtin");
        let img = render_marker(&dict, 9, 12, 2).expect("render");
        let matcher = Matcher::new(dict, 0);

        // Outer border corners: margin is 2 cells of 12 px.
        let quad = quad_of(24.0, 24.0, 7.0 * 12.0);
        let d = decode_quad(&img.view(), &quad, 1, 0.9, &matcher).expect("decode");
        assert_eq!(d.id, 9);
        assert_eq!(d.hamming, 0);
        assert!(d.border_score > 0.99);
        assert_eq!(d.corners, quad);
    }

    #[test]
    fn rotated_quad_canonicalizes_corners() {
        let dict = Dictionary::by_name("ARUCO_5X5_50").expect("builtin");
        let img = render_marker(&dict, 9, 12, 2).expect("render");
        let matcher = Matcher::new(dict, 0);

        let quad = quad_of(24.0, 24.0, 7.0 * 12.0);
        // Same physical quad, listed starting from a different corner.
        let shifted = [quad[1], quad[2], quad[3], quad[0]];
        let d = decode_quad(&img.view(), &shifted, 1, 0.9, &matcher).expect("decode");
        assert_eq!(d.id, 9);
        assert_eq!(d.corners, quad);
    }

    #[test]
    fn otsu_splits_bimodal_cell_means() {
        let mut samples = vec![10u8; 20];
        samples.extend(vec![240u8; 20]);
        let t = otsu_split(&samples);
        assert!(t >= 10 && t < 240);
    }

    #[test]
    fn otsu_keeps_flat_cell_means_intact() {
        assert_eq!(otsu_split(&[80; 16]), 80);
    }

    #[test]
    fn blank_region_does_not_decode() {
        let dict = Dictionary::by_name("ARUCO_5X5_50").expect("builtin");
        let img = tagpose_core::GrayImage::new(128, 128, 255);
        let matcher = Matcher::new(dict, 0);
        let quad = quad_of(20.0, 20.0, 84.0);
        assert!(decode_quad(&img.view(), &quad, 1, 0.9, &matcher).is_none());
    }
}
