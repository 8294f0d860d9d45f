use std::ops::{Add, Mul, Sub};

/// 2D vector in pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalize(self) -> Self {
        let length = self.length();
        if length == 0.0 {
            self
        } else {
            Self::new(self.x / length, self.y / length)
        }
    }

    /// Mirrors the vector about a unit `normal`.
    pub fn reflect(self, normal: Vector2) -> Self {
        self - normal * (2.0 * self.dot(normal))
    }

    /// Rotates counter-clockwise by `degrees`.
    pub fn turn(self, degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;

    fn mul(self, scalar: f64) -> Vector2 {
        Vector2::new(self.x * scalar, self.y * scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vector2, b: Vector2) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn turning_a_quarter_rotates_axes() {
        assert!(close(Vector2::new(1.0, 0.0).turn(90.0), Vector2::new(0.0, 1.0)));
        assert!(close(Vector2::new(0.0, -1.0).turn(180.0), Vector2::new(0.0, 1.0)));
    }

    #[test]
    fn reflection_flips_the_normal_component() {
        let reflected = Vector2::new(3.0, -4.0).reflect(Vector2::new(0.0, 1.0));
        assert!(close(reflected, Vector2::new(3.0, 4.0)));
    }

    #[test]
    fn normalize_handles_zero() {
        assert_eq!(Vector2::default().normalize(), Vector2::default());
        assert!((Vector2::new(3.0, 4.0).normalize().length() - 1.0).abs() < 1e-12);
    }
}
