//! Plane-induced projective transforms.
//!
//! `H` maps source-plane points to destination points: `x' ~ H x`. Both the
//! minimal 4-point solve and the overdetermined normalized DLT apply
//! Hartley normalization (translate to centroid, scale so the mean distance
//! is sqrt(2)) before solving, and de-normalize the result.

use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};

use crate::{sample_bilinear_u8, GrayImage, GrayImageView};

/// A 3×3 projective transform stored in `f64`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// Apply to an image-space point in `f32`.
    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let q = self.apply_f64(Point2::new(p.x as f64, p.y as f64));
        Point2::new(q.x as f32, q.y as f32)
    }

    /// Apply in full `f64` precision.
    #[inline]
    pub fn apply_f64(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

fn hartley_transform(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for p in pts {
        cx += p.x;
        cy += p.y;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0;
    for p in pts {
        let dx = p.x - cx;
        let dy = p.y - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;

    let t = hartley_transform(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

fn denormalize(hn: Matrix3<f64>, t_src: Matrix3<f64>, t_dst: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    let h = t_dst_inv * hn * t_src;
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

/// Minimal solve from exactly 4 correspondences (fixes `h33 = 1`).
///
/// Corner order must be consistent between `src` and `dst`.
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let src64: Vec<Point2<f64>> = src.iter().map(|p| Point2::new(p.x as f64, p.y as f64)).collect();
    let dst64: Vec<Point2<f64>> = dst.iter().map(|p| Point2::new(p.x as f64, p.y as f64)).collect();

    let (s, t_src) = normalize_points(&src64);
    let (d, t_dst) = normalize_points(&dst64);

    // For each correspondence (x,y)->(u,v):
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = s[k].x;
        let y = s[k].y;
        let u = d[k].x;
        let v = d[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7], 1.0);
    denormalize(hn, t_src, t_dst).map(Homography::new)
}

/// Overdetermined estimate from `n >= 4` correspondences via normalized DLT.
///
/// Solves `A h = 0` by SVD; the solution is the right singular vector of the
/// smallest singular value.
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return None;
    }

    let (s, t_src) = normalize_points(src);
    let (d, t_dst) = normalize_points(dst);

    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for k in 0..n {
        let x = s[k].x;
        let y = s[k].y;
        let u = d[k].x;
        let v = d[k].y;

        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // nalgebra's thin SVD needs at least as many rows as columns.
    if a.nrows() < a.ncols() {
        let rows = a.nrows();
        let mut padded = DMatrix::<f64>::zeros(9, 9);
        padded.view_mut((0, 0), (rows, 9)).copy_from(&a);
        a = padded;
    }

    let svd = a.svd(true, true);
    let vt = svd.v_t?;
    let h = vt.row(vt.nrows() - 1);
    let hn = Matrix3::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    denormalize(hn, t_src, t_dst).map(Homography::new)
}

/// Warp a perspective patch: for each destination pixel, map through
/// `h_src_from_dst` and sample the source bilinearly at the pixel center.
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    h_src_from_dst: Homography,
    out_w: usize,
    out_h: usize,
) -> GrayImage {
    let mut out = GrayImage::new(out_w, out_h, 0);
    for y in 0..out_h {
        for x in 0..out_w {
            let p = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
            let q = h_src_from_dst.apply(p);
            out.data[y * out_w + x] = sample_bilinear_u8(src, q.x, q.y);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        assert!(
            (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6})",
            a.x,
            a.y,
            b.x,
            b.y
        );
    }

    fn ground_truth() -> Homography {
        Homography::new(Matrix3::new(
            0.9, 0.08, 40.0, //
            -0.03, 1.05, 25.0, //
            0.0007, -0.0003, 1.0,
        ))
    }

    #[test]
    fn four_point_solve_recovers_h() {
        let gt = ground_truth();
        let src = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(120.0, 0.0),
            Point2::new(120.0, 90.0),
            Point2::new(0.0, 90.0),
        ];
        let dst = src.map(|p| gt.apply(p));
        let est = homography_from_4pt(&src, &dst).expect("solvable");

        // `dst` went through f32, so expect f32-level agreement only.
        for p in [Point2::new(10.0, 20.0), Point2::new(100.0, 70.0)] {
            let want = gt.apply_f64(p);
            assert_close(est.apply_f64(p), want, 1e-3);
        }
    }

    #[test]
    fn dlt_handles_overdetermined_case() {
        let gt = ground_truth();
        let src: Vec<Point2<f64>> = (0..4)
            .flat_map(|r| (0..5).map(move |c| Point2::new(c as f64 * 30.0, r as f64 * 30.0)))
            .collect();
        let dst: Vec<Point2<f64>> = src.iter().map(|&p| gt.apply_f64(p)).collect();

        let est = estimate_homography(&src, &dst).expect("estimate");
        for p in [Point2::new(15.0, 45.0), Point2::new(95.0, 10.0)] {
            assert_close(est.apply_f64(p), gt.apply_f64(p), 1e-6);
        }
    }

    #[test]
    fn inverse_round_trips() {
        let h = ground_truth();
        let inv = h.inverse().expect("invertible");
        let p = Point2::new(33.0, 57.0);
        assert_close(inv.apply_f64(h.apply_f64(p)), p, 1e-9);
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let src = vec![Point2::new(0.0, 0.0); 5];
        let dst = vec![Point2::new(0.0, 0.0); 4];
        assert!(estimate_homography(&src, &dst).is_none());
    }
}
