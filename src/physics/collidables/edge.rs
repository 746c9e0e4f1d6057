use glam::Vec2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::physics::body_properties::RigidPose;
use crate::physics::settings::POLYGON_RADIUS;
use crate::utilities::BoundingBox;

use super::ray::{RayCastInput, RayCastOutput};
use super::shape::{validate_density, MassData};

/// Two-sided line segment from `vertex1` to `vertex2`.
///
/// The optional ghost vertices `vertex0` and `vertex3` describe the neighboring segments of a
/// chain. They never collide themselves; the narrow phase uses them to keep contact normals
/// smooth where two segments meet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeShape {
    pub vertex0: Vec2,
    pub vertex1: Vec2,
    pub vertex2: Vec2,
    pub vertex3: Vec2,
    pub has_vertex0: bool,
    pub has_vertex3: bool,
    radius: f32,
    density: f32,
}

impl Default for EdgeShape {
    fn default() -> Self {
        Self::new(Vec2::ZERO, Vec2::ZERO)
    }
}

impl EdgeShape {
    pub fn new(vertex1: Vec2, vertex2: Vec2) -> Self {
        Self {
            vertex0: Vec2::ZERO,
            vertex1,
            vertex2,
            vertex3: Vec2::ZERO,
            has_vertex0: false,
            has_vertex3: false,
            radius: POLYGON_RADIUS,
            density: 0.0,
        }
    }

    /// Replaces both primary vertices and clears the ghost links.
    pub fn set(&mut self, vertex1: Vec2, vertex2: Vec2) {
        self.vertex1 = vertex1;
        self.vertex2 = vertex2;
        self.has_vertex0 = false;
        self.has_vertex3 = false;
    }

    /// Sets or clears the ghost vertex preceding `vertex1`.
    pub fn set_vertex0(&mut self, vertex0: Option<Vec2>) {
        self.has_vertex0 = vertex0.is_some();
        self.vertex0 = vertex0.unwrap_or(Vec2::ZERO);
    }

    /// Sets or clears the ghost vertex following `vertex2`.
    pub fn set_vertex3(&mut self, vertex3: Option<Vec2>) {
        self.has_vertex3 = vertex3.is_some();
        self.vertex3 = vertex3.unwrap_or(Vec2::ZERO);
    }

    #[inline(always)]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline(always)]
    pub fn density(&self) -> f32 {
        self.density
    }

    /// Edges are massless; the density is stored only so it survives shape swaps.
    pub fn set_density(&mut self, density: f32) -> Result<(), PhysicsError> {
        validate_density(density)?;
        self.density = density;
        Ok(())
    }

    #[inline(always)]
    pub fn mass_data(&self) -> MassData {
        MassData {
            area: 0.0,
            centroid: 0.5 * (self.vertex1 + self.vertex2),
            inertia: 0.0,
            mass: 0.0,
        }
    }

    /// Intersects the segment with the edge's supporting line in edge space. The returned
    /// normal faces the side the ray arrives from.
    pub fn ray_cast(&self, input: &RayCastInput, transform: &RigidPose) -> Option<RayCastOutput> {
        let p1 = transform.transform_by_inverse(input.p1);
        let p2 = transform.transform_by_inverse(input.p2);
        let d = p2 - p1;

        let v1 = self.vertex1;
        let v2 = self.vertex2;
        let e = v2 - v1;
        let normal = Vec2::new(e.y, -e.x).normalize_or_zero();

        // q = p1 + t * d
        // dot(normal, q - v1) = 0
        // dot(normal, p1 - v1) + t * dot(normal, d) = 0
        let numerator = normal.dot(v1 - p1);
        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + t * d;

        // q = v1 + s * r
        // s = dot(q - v1, r) / dot(r, r)
        let rr = e.dot(e);
        if rr == 0.0 {
            return None;
        }
        let s = (q - v1).dot(e) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let world_normal = transform.rotation.apply(normal);
        Some(RayCastOutput {
            normal: if numerator > 0.0 {
                -world_normal
            } else {
                world_normal
            },
            fraction: t,
        })
    }

    pub fn compute_aabb(&self, transform: &RigidPose) -> BoundingBox {
        let v1 = transform.transform(self.vertex1);
        let v2 = transform.transform(self.vertex2);
        BoundingBox::new(v1.min(v2), v1.max(v2)).expanded(self.radius)
    }

    pub fn compare_to(&self, other: &EdgeShape) -> bool {
        self.radius == other.radius
            && self.vertex1 == other.vertex1
            && self.vertex2 == other.vertex2
            && self.has_vertex0 == other.has_vertex0
            && self.has_vertex3 == other.has_vertex3
            && (!self.has_vertex0 || self.vertex0 == other.vertex0)
            && (!self.has_vertex3 || self.vertex3 == other.vertex3)
    }
}
