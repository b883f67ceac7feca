/// 2D vector utilities for board-space positions and velocities.
/// Board space is in pixels; +x to the right, +y down.

#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Wire representation used by `move` messages.
    pub fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl From<[f64; 2]> for Vec2 {
    fn from(v: [f64; 2]) -> Self {
        Vec2::new(v[0], v[1])
    }
}

/// Shorthand constructor
pub fn vec2(x: f64, y: f64) -> Vec2 {
    Vec2::new(x, y)
}

/// Add two vectors
pub fn add(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x + b.x, a.y + b.y)
}

/// Subtract vectors (a - b)
pub fn sub(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(a.x - b.x, a.y - b.y)
}

/// Scale vector by scalar
pub fn scale(v: Vec2, s: f64) -> Vec2 {
    Vec2::new(v.x * s, v.y * s)
}

/// Dot product
pub fn dot(a: Vec2, b: Vec2) -> f64 {
    a.x * b.x + a.y * b.y
}

/// Vector length
pub fn length(v: Vec2) -> f64 {
    (v.x * v.x + v.y * v.y).sqrt()
}

/// Squared length, avoids the sqrt where only comparisons are needed
pub fn length_sq(v: Vec2) -> f64 {
    v.x * v.x + v.y * v.y
}

/// Euclidean distance between two points
pub fn distance(a: Vec2, b: Vec2) -> f64 {
    length(sub(a, b))
}

/// Normalize vector to unit length.
/// Returns `None` for (near) zero vectors, which have no direction.
pub fn normalize(v: Vec2) -> Option<Vec2> {
    let len = length(v);
    if len < 1e-10 {
        return None;
    }
    Some(Vec2::new(v.x / len, v.y / len))
}

/// Perpendicular: `v` rotated by +90 degrees, i.e. (-y, x)
pub fn perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec2_close(actual: Vec2, expected: Vec2) {
        assert!(
            (actual.x - expected.x).abs() < 1e-9 && (actual.y - expected.y).abs() < 1e-9,
            "Expected {:?} to be close to {:?}",
            actual,
            expected
        );
    }

    #[test]
    fn add_and_sub_are_inverse() {
        let a = vec2(1.5, -2.0);
        let b = vec2(0.25, 4.0);
        assert_vec2_close(sub(add(a, b), b), a);
    }

    #[test]
    fn scale_multiplies() {
        assert_vec2_close(scale(vec2(1.0, -2.0), 3.0), vec2(3.0, -6.0));
    }

    #[test]
    fn dot_orthogonal_is_zero() {
        assert_eq!(dot(vec2(1.0, 0.0), vec2(0.0, 1.0)), 0.0);
    }

    #[test]
    fn length_of_3_4_is_5() {
        assert_eq!(length(vec2(3.0, 4.0)), 5.0);
        assert_eq!(length_sq(vec2(3.0, 4.0)), 25.0);
        assert_eq!(distance(vec2(1.0, 1.0), vec2(4.0, 5.0)), 5.0);
    }

    #[test]
    fn normalize_returns_unit_vector() {
        let v = normalize(vec2(3.0, 4.0)).unwrap();
        assert_vec2_close(v, vec2(0.6, 0.8));
    }

    #[test]
    fn normalize_zero_has_no_direction() {
        assert!(normalize(Vec2::ZERO).is_none());
    }

    #[test]
    fn perp_is_orthogonal_and_same_length() {
        let v = vec2(2.0, 7.0);
        let p = perp(v);
        assert_eq!(dot(v, p), 0.0);
        assert_eq!(length(v), length(p));
        assert_vec2_close(perp(vec2(1.0, 0.0)), vec2(0.0, 1.0));
    }

    #[test]
    fn array_conversion() {
        let v: Vec2 = [1.0, -3.0].into();
        assert_eq!(v.to_array(), [1.0, -3.0]);
    }
}
