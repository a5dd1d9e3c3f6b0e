//! Angle arithmetic.

use std::f32::consts::{PI, TAU};

/// Normalize angle to (-π, π].
///
/// # Example
/// ```
/// use naksha_slam::core::math::normalize_angle;
/// use std::f32::consts::PI;
///
/// assert!((normalize_angle(2.5 * PI) - 0.5 * PI).abs() < 1e-5);
/// assert!((normalize_angle(-PI) - PI).abs() < 1e-6);
/// ```
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let a = angle.rem_euclid(TAU);
    if a > PI { a - TAU } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_angle_zero() {
        assert_relative_eq!(normalize_angle(0.0), 0.0);
    }

    #[test]
    fn test_normalize_angle_pi_boundary() {
        assert_relative_eq!(normalize_angle(PI), PI);
        assert_relative_eq!(normalize_angle(-PI), PI);
    }

    #[test]
    fn test_normalize_angle_wraps() {
        assert_relative_eq!(normalize_angle(2.0 * PI), 0.0, epsilon = 1e-6);
        assert_relative_eq!(normalize_angle(1.5 * PI), -0.5 * PI, epsilon = 1e-5);
        assert_relative_eq!(normalize_angle(-1.5 * PI), 0.5 * PI, epsilon = 1e-5);
        assert_relative_eq!(normalize_angle(7.0), 7.0 - TAU, epsilon = 1e-5);
    }
}
