use glam::Vec2;
use std::f32::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::physics::body_properties::RigidPose;
use crate::utilities::math_helper::EPSILON;
use crate::utilities::BoundingBox;

use super::ray::{RayCastInput, RayCastOutput};
use super::shape::{validate_density, MassData};

/// Collision shape representing a solid circle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CircleShape {
    radius: f32,
    /// Cached `radius * radius`.
    radius_squared: f32,
    /// Center of the circle in shape space.
    position: Vec2,
    density: f32,
    mass_data: MassData,
}

impl CircleShape {
    /// Creates a circle centered on the shape origin.
    pub fn new(radius: f32, density: f32) -> Result<Self, PhysicsError> {
        Self::with_position(Vec2::ZERO, radius, density)
    }

    /// Creates a circle centered on `position` in shape space.
    pub fn with_position(position: Vec2, radius: f32, density: f32) -> Result<Self, PhysicsError> {
        if !(radius >= 0.0) || !radius.is_finite() {
            return Err(PhysicsError::InvalidRadius { radius });
        }
        validate_density(density)?;
        let mut shape = Self {
            radius,
            radius_squared: radius * radius,
            position,
            density,
            mass_data: MassData::default(),
        };
        shape.compute_properties();
        Ok(shape)
    }

    #[inline(always)]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline(always)]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    #[inline(always)]
    pub fn density(&self) -> f32 {
        self.density
    }

    #[inline(always)]
    pub fn mass_data(&self) -> &MassData {
        &self.mass_data
    }

    pub fn set_radius(&mut self, radius: f32) -> Result<(), PhysicsError> {
        if !(radius >= 0.0) || !radius.is_finite() {
            return Err(PhysicsError::InvalidRadius { radius });
        }
        self.radius = radius;
        self.radius_squared = radius * radius;
        self.compute_properties();
        Ok(())
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.compute_properties();
    }

    pub fn set_density(&mut self, density: f32) -> Result<(), PhysicsError> {
        validate_density(density)?;
        self.density = density;
        self.compute_properties();
        Ok(())
    }

    fn compute_properties(&mut self) {
        let area = PI * self.radius_squared;
        let mass = self.density * area;
        self.mass_data = MassData {
            area,
            mass,
            centroid: self.position,
            // Inertia about the shape origin.
            inertia: mass * (0.5 * self.radius_squared + self.position.dot(self.position)),
        };
    }

    pub fn test_point(&self, transform: &RigidPose, point: Vec2) -> bool {
        let center = transform.transform(self.position);
        let d = point - center;
        d.dot(d) <= self.radius_squared
    }

    /// Intersects the segment with the circle by solving the quadratic in the segment parameter.
    pub fn ray_cast(&self, input: &RayCastInput, transform: &RigidPose) -> Option<RayCastOutput> {
        let center = transform.transform(self.position);
        let s = input.p1 - center;
        let b = s.dot(s) - self.radius_squared;

        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.dot(r);
        let sigma = c * c - rr * b;

        // Negative discriminant or a degenerate segment.
        if sigma < 0.0 || rr < EPSILON {
            return None;
        }

        // Smallest root is the entry point.
        let a = -(c + sigma.sqrt());
        if 0.0 <= a && a <= input.max_fraction * rr {
            let fraction = a / rr;
            let normal = (s + fraction * r).normalize_or_zero();
            return Some(RayCastOutput { normal, fraction });
        }
        None
    }

    pub fn compute_aabb(&self, transform: &RigidPose) -> BoundingBox {
        let center = transform.transform(self.position);
        BoundingBox::from_center_half_extents(center, Vec2::splat(self.radius))
    }

    /// Area and centroid of the part of the circle below the plane `dot(normal, x) = offset`.
    pub fn compute_submerged_area(
        &self,
        normal: Vec2,
        offset: f32,
        transform: &RigidPose,
    ) -> (f32, Vec2) {
        let center = transform.transform(self.position);
        let l = -(normal.dot(center) - offset);

        if l < -self.radius + EPSILON {
            // Completely dry.
            return (0.0, Vec2::ZERO);
        }
        if l > self.radius {
            // Completely wet.
            return (PI * self.radius_squared, center);
        }

        let l2 = l * l;
        let area = self.radius_squared * ((l / self.radius).asin() + 0.5 * PI)
            + l * (self.radius_squared - l2).sqrt();
        let com = -2.0 / 3.0 * (self.radius_squared - l2).powf(1.5) / area;
        (area, center + normal * com)
    }

    pub fn compare_to(&self, other: &CircleShape) -> bool {
        self.radius == other.radius && self.position == other.position
    }
}
