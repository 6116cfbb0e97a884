//! X-corner response on a binarized frame.
//!
//! Intensities sampled on a small ring around a checkerboard junction
//! alternate dark/light twice per revolution, so the junction shows up as a
//! strong second circular harmonic of the ring signal. Plain edges and
//! board-outline L-corners put their energy into the first harmonic
//! instead, which is subtracted as a penalty.

use nalgebra::Point2;

use tagpose_core::{sample_bilinear, GrayImageView};

use crate::params::ExtractorParams;

const RING_SAMPLES: usize = 16;

/// One corner candidate before grid organization.
#[derive(Clone, Copy, Debug)]
pub struct CornerCandidate {
    /// Sub-pixel position in pixel-center coordinates.
    pub position: Point2<f32>,
    /// Corner response at the winning pixel.
    pub strength: f32,
}

fn ring_offsets(radius: f32) -> [(f32, f32); RING_SAMPLES] {
    let mut out = [(0.0, 0.0); RING_SAMPLES];
    for (k, slot) in out.iter_mut().enumerate() {
        let theta = 2.0 * std::f32::consts::PI * k as f32 / RING_SAMPLES as f32;
        *slot = (radius * theta.cos(), radius * theta.sin());
    }
    out
}

/// Second-harmonic magnitude minus first-harmonic magnitude of the ring
/// signal, clamped at zero.
fn ring_response(samples: &[f32; RING_SAMPLES]) -> f32 {
    let mut c1_re = 0.0f32;
    let mut c1_im = 0.0f32;
    let mut c2_re = 0.0f32;
    let mut c2_im = 0.0f32;

    for (k, &s) in samples.iter().enumerate() {
        let theta = 2.0 * std::f32::consts::PI * k as f32 / RING_SAMPLES as f32;
        c1_re += s * theta.cos();
        c1_im += s * theta.sin();
        let two = 2.0 * theta;
        c2_re += s * two.cos();
        c2_im += s * two.sin();
    }

    let c1 = (c1_re * c1_re + c1_im * c1_im).sqrt();
    let c2 = (c2_re * c2_re + c2_im * c2_im).sqrt();
    (c2 - c1).max(0.0)
}

/// Dense corner response over the frame interior.
fn response_map(binary: &GrayImageView<'_>, radius: f32) -> Vec<f32> {
    let w = binary.width;
    let h = binary.height;
    let offsets = ring_offsets(radius);
    let margin = radius.ceil() as usize + 1;
    let mut map = vec![0.0f32; w * h];

    if w <= 2 * margin || h <= 2 * margin {
        return map;
    }

    for y in margin..(h - margin) {
        for x in margin..(w - margin) {
            let mut samples = [0.0f32; RING_SAMPLES];
            for (k, &(dx, dy)) in offsets.iter().enumerate() {
                samples[k] = sample_bilinear(binary, x as f32 + dx, y as f32 + dy);
            }
            map[y * w + x] = ring_response(&samples);
        }
    }
    map
}

/// Detect X-corner candidates on an already-binarized frame.
///
/// Non-maximum suppression keeps one winner per neighborhood (ties go to
/// the earlier pixel in raster order); each winner is refined by a
/// response-weighted centroid over its suppression window.
pub fn detect_corner_candidates(
    binary: &GrayImageView<'_>,
    params: &ExtractorParams,
) -> Vec<CornerCandidate> {
    let w = binary.width;
    let h = binary.height;
    let map = response_map(binary, params.ring_radius);

    let max_response = map.iter().cloned().fold(0.0f32, f32::max);
    if max_response <= 0.0 {
        return Vec::new();
    }
    let threshold = params.rel_strength * max_response;
    let r = params.nms_radius as i32;

    let mut out = Vec::new();
    for y in 0..h as i32 {
        'pixels: for x in 0..w as i32 {
            let idx = y as usize * w + x as usize;
            let v = map[idx];
            if v < threshold {
                continue;
            }

            // NMS over the (2r+1)^2 window.
            for dy in -r..=r {
                for dx in -r..=r {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    if nidx == idx {
                        continue;
                    }
                    let nv = map[nidx];
                    if nv > v || (nv == v && nidx < idx) {
                        continue 'pixels;
                    }
                }
            }

            // Centroid refinement over the same window.
            let mut sum_w = 0.0f32;
            let mut sum_x = 0.0f32;
            let mut sum_y = 0.0f32;
            for dy in -r..=r {
                for dx in -r..=r {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    let nv = map[ny as usize * w + nx as usize];
                    if nv <= 0.0 {
                        continue;
                    }
                    sum_w += nv;
                    sum_x += nv * nx as f32;
                    sum_y += nv * ny as f32;
                }
            }

            out.push(CornerCandidate {
                position: Point2::new(sum_x / sum_w, sum_y / sum_w),
                strength: v,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagpose_core::GrayImage;

    /// 2x2 checker junction centered in the frame.
    fn junction_frame(size: usize) -> GrayImage {
        let mut img = GrayImage::new(size, size, 255);
        let half = size / 2;
        for y in 0..size {
            for x in 0..size {
                let dark = (x < half) == (y < half);
                if dark {
                    img.data[y * size + x] = 0;
                }
            }
        }
        img
    }

    #[test]
    fn junction_yields_single_candidate_near_center() {
        let img = junction_frame(32);
        let params = ExtractorParams::default();
        let found = detect_corner_candidates(&img.view(), &params);

        assert_eq!(found.len(), 1, "expected one corner, got {:?}", found);
        let p = found[0].position;
        // Junction sits between pixels 15 and 16.
        assert!((p.x - 15.5).abs() < 1.0, "x = {}", p.x);
        assert!((p.y - 15.5).abs() < 1.0, "y = {}", p.y);
    }

    #[test]
    fn uniform_frame_has_no_candidates() {
        let img = GrayImage::new(32, 32, 255);
        let found = detect_corner_candidates(&img.view(), &ExtractorParams::default());
        assert!(found.is_empty());
    }
}
