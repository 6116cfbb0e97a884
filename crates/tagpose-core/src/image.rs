//! Grayscale image containers and low-level pixel operations.
//!
//! Frames are plain row-major `u8` buffers. The borrowed view type lets
//! callers hand in frames from any source (camera driver, decoded file,
//! synthetic test buffer) without copying.

/// Borrowed grayscale frame.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

/// Owned grayscale frame.
#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Allocate a frame filled with `fill`.
    pub fn new(width: usize, height: usize, fill: u8) -> Self {
        Self {
            width,
            height,
            data: vec![fill; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).clamp(0.0, 255.0) as u8
}

/// Linear min/max contrast stretch to the full `0..=255` range.
///
/// A flat image is returned unchanged.
pub fn normalize_contrast(src: &GrayImageView<'_>) -> GrayImage {
    let mut min_v = 255u8;
    let mut max_v = 0u8;
    for &v in src.data {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }

    let mut out = GrayImage::new(src.width, src.height, 0);
    if max_v <= min_v {
        out.data.copy_from_slice(src.data);
        return out;
    }

    let span = (max_v - min_v) as f32;
    for (dst, &v) in out.data.iter_mut().zip(src.data.iter()) {
        *dst = (((v - min_v) as f32) * 255.0 / span).round() as u8;
    }
    out
}

/// Summed-area table with one extra row/column of zeros.
///
/// `integral[(y + 1) * (w + 1) + (x + 1)]` is the sum of all pixels in
/// `[0..=x] × [0..=y]`.
pub fn integral_image(src: &GrayImageView<'_>) -> Vec<u64> {
    let w = src.width;
    let h = src.height;
    let stride = w + 1;
    let mut integral = vec![0u64; stride * (h + 1)];

    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += src.data[y * w + x] as u64;
            integral[(y + 1) * stride + (x + 1)] = integral[y * stride + (x + 1)] + row_sum;
        }
    }
    integral
}

/// Adaptive mean threshold: a pixel is foreground (255) when it exceeds the
/// mean of its `(2*radius+1)²` neighborhood minus `offset`.
///
/// The window is clipped at the frame borders, so border pixels compare
/// against a smaller neighborhood rather than padded zeros.
pub fn adaptive_threshold(src: &GrayImageView<'_>, radius: usize, offset: i16) -> GrayImage {
    let w = src.width;
    let h = src.height;
    let stride = w + 1;
    let integral = integral_image(src);
    let mut out = GrayImage::new(w, h, 0);

    for y in 0..h {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius + 1).min(h);
        for x in 0..w {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius + 1).min(w);

            let area = ((y1 - y0) * (x1 - x0)) as i64;
            let sum = (integral[y1 * stride + x1] + integral[y0 * stride + x0]) as i64
                - (integral[y1 * stride + x0] + integral[y0 * stride + x1]) as i64;
            let mean = sum / area;

            let v = src.data[y * w + x] as i64;
            out.data[y * w + x] = if v > mean - offset as i64 { 255 } else { 0 };
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let img = GrayImage {
            width: 2,
            height: 1,
            data: vec![0, 100],
        };
        let v = sample_bilinear(&img.view(), 0.5, 0.0);
        assert!((v - 50.0).abs() < 1e-4);
    }

    #[test]
    fn contrast_stretch_hits_full_range() {
        let img = GrayImage {
            width: 4,
            height: 1,
            data: vec![100, 120, 140, 160],
        };
        let out = normalize_contrast(&img.view());
        assert_eq!(out.data[0], 0);
        assert_eq!(out.data[3], 255);
    }

    #[test]
    fn integral_image_sums_rectangles() {
        let img = GrayImage {
            width: 3,
            height: 2,
            data: vec![1, 2, 3, 4, 5, 6],
        };
        let integral = integral_image(&img.view());
        let stride = 4;
        // Full image sum.
        assert_eq!(integral[2 * stride + 3], 21);
        // First row only.
        assert_eq!(integral[stride + 3], 6);
    }

    #[test]
    fn adaptive_threshold_splits_dark_and_bright_halves() {
        let mut img = GrayImage::new(16, 4, 40);
        for y in 0..4 {
            for x in 8..16 {
                img.data[y * 16 + x] = 200;
            }
        }
        let bin = adaptive_threshold(&img.view(), 8, 5);
        assert_eq!(bin.data[2 * 16 + 2], 0);
        assert_eq!(bin.data[2 * 16 + 13], 255);
    }
}
