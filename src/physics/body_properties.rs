use glam::Vec2;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rotation stored as a sine/cosine pair.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rot {
    pub s: f32,
    pub c: f32,
}

impl Default for Rot {
    #[inline(always)]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rot {
    pub const IDENTITY: Self = Self { s: 0.0, c: 1.0 };

    #[inline(always)]
    pub fn from_angle(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { s, c }
    }

    #[inline(always)]
    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    /// Rotates a vector.
    #[inline(always)]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Rotates a vector by the inverse rotation.
    #[inline(always)]
    pub fn apply_inverse(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Composes two rotations: `self * other`.
    #[inline(always)]
    pub fn multiply(&self, other: &Rot) -> Rot {
        Rot {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }

    /// Composes the inverse of this rotation with another: `self^T * other`.
    #[inline(always)]
    pub fn multiply_by_inverse(&self, other: &Rot) -> Rot {
        Rot {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }
}

/// Represents a rigid transformation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidPose {
    /// Position of the pose.
    pub position: Vec2,
    /// Orientation of the pose.
    pub rotation: Rot,
}

impl RigidPose {
    /// Returns a pose with a position at (0,0) and identity orientation.
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        rotation: Rot::IDENTITY,
    };

    /// Creates a rigid pose with the given position and angle.
    #[inline(always)]
    pub fn new(position: Vec2, angle: f32) -> Self {
        Self {
            position,
            rotation: Rot::from_angle(angle),
        }
    }

    /// Creates a rigid pose with the given position and identity orientation.
    #[inline(always)]
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            rotation: Rot::IDENTITY,
        }
    }

    /// Transforms a point from local space into the pose's space.
    #[inline(always)]
    pub fn transform(&self, v: Vec2) -> Vec2 {
        self.rotation.apply(v) + self.position
    }

    /// Transforms a point by the inverse of the pose.
    #[inline(always)]
    pub fn transform_by_inverse(&self, v: Vec2) -> Vec2 {
        self.rotation.apply_inverse(v - self.position)
    }

    /// Concatenates two transforms: applying the result equals applying `b` then `self`.
    #[inline(always)]
    pub fn multiply(&self, b: &RigidPose) -> RigidPose {
        RigidPose {
            rotation: self.rotation.multiply(&b.rotation),
            position: self.rotation.apply(b.position) + self.position,
        }
    }

    /// Expresses `b` in the local frame of `self`: `self^-1 * b`.
    #[inline(always)]
    pub fn multiply_by_inverse(&self, b: &RigidPose) -> RigidPose {
        RigidPose {
            rotation: self.rotation.multiply_by_inverse(&b.rotation),
            position: self.rotation.apply_inverse(b.position - self.position),
        }
    }
}

impl From<Vec2> for RigidPose {
    fn from(position: Vec2) -> Self {
        Self::from_position(position)
    }
}

impl fmt::Display for RigidPose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}, {}rad", self.position, self.rotation.angle())
    }
}

/// Describes the motion of a body over one step for continuous correction. Positions are
/// of the center of mass; `local_center` locates it in body space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sweep {
    pub local_center: Vec2,
    /// Center of mass at the start of the step.
    pub c0: Vec2,
    /// Current center of mass.
    pub c: Vec2,
    pub a0: f32,
    pub a: f32,
    /// Fraction of the step already covered by `c0`/`a0`.
    pub alpha0: f32,
}

impl Sweep {
    /// Interpolated body transform at `beta` in [0, 1] across the step.
    pub fn get_transform(&self, beta: f32) -> RigidPose {
        let center = (1.0 - beta) * self.c0 + beta * self.c;
        let angle = (1.0 - beta) * self.a0 + beta * self.a;
        let rotation = Rot::from_angle(angle);
        RigidPose {
            position: center - rotation.apply(self.local_center),
            rotation,
        }
    }

    /// Moves the start of the sweep forward to `alpha`.
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += beta * (self.c - self.c0);
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Wraps the start angle into [-pi, pi], shifting the end angle by the same amount.
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * std::f32::consts::PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

/// Linear and angular velocity of a body.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyVelocity {
    pub linear: Vec2,
    pub angular: f32,
}

impl BodyVelocity {
    #[inline(always)]
    pub fn new(linear: Vec2, angular: f32) -> Self {
        Self { linear, angular }
    }
}

/// Inverse mass properties of a body. Zeroes describe an immovable body.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyInertia {
    pub inverse_mass: f32,
    /// Inverse rotational inertia about the center of mass.
    pub inverse_inertia: f32,
}

/// Working copy of a body's center of mass position used by the position solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverPosition {
    pub c: Vec2,
    pub a: f32,
}

/// Working copy of a body's velocity used by the velocity solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverVelocity {
    pub v: Vec2,
    pub w: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn transform_round_trips_through_inverse() {
        let pose = RigidPose::new(Vec2::new(1.0, -2.0), 0.7);
        let p = Vec2::new(0.3, 4.0);
        assert!(close(pose.transform_by_inverse(pose.transform(p)), p));
    }

    #[test]
    fn multiply_by_inverse_undoes_multiply() {
        let a = RigidPose::new(Vec2::new(1.0, 2.0), 0.3);
        let b = RigidPose::new(Vec2::new(-4.0, 0.5), -1.1);
        let ab = a.multiply(&b);
        let back = a.multiply_by_inverse(&ab);
        assert!(close(back.position, b.position));
        assert!((back.rotation.angle() - b.rotation.angle()).abs() < 1e-5);
    }

    #[test]
    fn sweep_interpolates_center() {
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::ZERO,
            c: Vec2::new(2.0, 0.0),
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        };
        assert!(close(sweep.get_transform(0.5).position, Vec2::new(1.0, 0.0)));
    }

    #[test]
    fn sweep_normalize_keeps_difference() {
        let mut sweep = Sweep {
            a0: 7.0,
            a: 7.5,
            ..Default::default()
        };
        sweep.normalize();
        assert!(sweep.a0.abs() <= std::f32::consts::PI * 2.0);
        assert!((sweep.a - sweep.a0 - 0.5).abs() < 1e-5);
    }
}
