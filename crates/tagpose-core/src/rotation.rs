//! Axis-angle (Rodrigues) conversions.
//!
//! Rotation vectors encode a rotation as `axis * angle`. The conversions
//! delegate to `nalgebra::Rotation3`, which implements the Rodrigues
//! formula in both directions.

use nalgebra::{Matrix3, Rotation3, Vector3};

/// Rotation vector -> 3×3 rotation matrix.
#[inline]
pub fn rotation_from_rvec(rvec: &Vector3<f64>) -> Matrix3<f64> {
    *Rotation3::from_scaled_axis(*rvec).matrix()
}

/// 3×3 rotation matrix -> rotation vector.
///
/// The input is assumed orthonormal with determinant +1.
#[inline]
pub fn rvec_from_rotation(r: &Matrix3<f64>) -> Vector3<f64> {
    Rotation3::from_matrix_unchecked(*r).scaled_axis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn quarter_turn_about_z() {
        let rvec = Vector3::new(0.0, 0.0, FRAC_PI_2);
        let r = rotation_from_rvec(&rvec);
        let rotated = r * Vector3::x();
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(rotated.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn rvec_round_trips() {
        let rvec = Vector3::new(0.3, -0.7, 0.2);
        let back = rvec_from_rotation(&rotation_from_rvec(&rvec));
        assert_relative_eq!((back - rvec).norm(), 0.0, epsilon = 1e-10);
    }
}
