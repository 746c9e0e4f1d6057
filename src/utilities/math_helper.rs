use glam::Vec2;

/// Machine epsilon used for degenerate-length checks.
pub const EPSILON: f32 = f32::EPSILON;

/// Clamps a value between a minimum and maximum value.
#[inline(always)]
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Returns -1 if the value is negative and 1 otherwise.
#[inline(always)]
pub fn binary_sign(x: f32) -> f32 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Scalar 2D cross product, `a.x * b.y - a.y * b.x`.
#[inline(always)]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.perp_dot(b)
}

/// Cross product of a vector and a scalar: `(s * v.y, -s * v.x)`.
#[inline(always)]
pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Cross product of a scalar and a vector: `(-s * v.y, s * v.x)`.
#[inline(always)]
pub fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Normalizes a vector, returning `None` if its length is below epsilon.
#[inline(always)]
pub fn try_normalize(v: Vec2) -> Option<Vec2> {
    let length = v.length();
    if length < EPSILON {
        None
    } else {
        Some(v / length)
    }
}

/// Gets whether both components are finite.
#[inline(always)]
pub fn is_valid(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}
