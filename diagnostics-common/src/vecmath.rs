use serde::{Deserialize, Serialize};

/// A simple 2D vector, used for eccentricity vectors and Cartesian positions.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    /// Creates a new Vec2.
    #[inline(always)]
    pub fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    #[inline(always)]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Magnitude of the vector.
    #[inline(always)]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Polar form `(radius, angle)` with the angle in `(-pi, pi]`.
    #[inline(always)]
    pub fn to_polar(self) -> (f64, f64) {
        (self.length(), vec_to_angle(self))
    }
}

/// Converts a vector to an angle (in radians).
/// Uses atan2 for quadrant correctness.
#[inline(always)]
pub fn vec_to_angle(vec: Vec2) -> f64 {
    vec.y.atan2(vec.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_polar_quadrants() {
        let (r, a) = Vec2::new(-1.0, 0.0).to_polar();
        assert_relative_eq!(r, 1.0);
        assert_relative_eq!(a, PI);

        let (r, a) = Vec2::new(0.0, -2.0).to_polar();
        assert_relative_eq!(r, 2.0);
        assert_relative_eq!(a, -PI / 2.0);
    }

    #[test]
    fn test_angle_round_trip() {
        let angle: f64 = 0.75;
        let v = Vec2::new(3.0 * angle.cos(), 3.0 * angle.sin());
        assert_relative_eq!(vec_to_angle(v), 0.75, epsilon = 1e-12);
        assert_relative_eq!(v.length(), 3.0, epsilon = 1e-12);
    }
}
