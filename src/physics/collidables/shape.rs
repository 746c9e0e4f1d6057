use glam::Vec2;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::physics::body_properties::RigidPose;
use crate::utilities::BoundingBox;

use super::chain::ChainShape;
use super::circle::CircleShape;
use super::edge::EdgeShape;
use super::polygon::PolygonShape;
use super::ray::{RayCastInput, RayCastOutput};

/// Mass properties of a shape, computed from its geometry and density.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassData {
    pub area: f32,
    /// Center of mass in shape space.
    pub centroid: Vec2,
    /// Rotational inertia about the shape origin.
    pub inertia: f32,
    pub mass: f32,
}

pub(crate) fn validate_density(density: f32) -> Result<(), PhysicsError> {
    if !(density >= 0.0) || !density.is_finite() {
        return Err(PhysicsError::InvalidDensity { density });
    }
    Ok(())
}

/// Type tag of a shape. The numeric values order pair canonicalization in the narrow phase.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeType {
    Circle = 0,
    Edge = 1,
    Polygon = 2,
    Chain = 3,
}

impl ShapeType {
    pub const COUNT: usize = 4;

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ShapeType::Circle => "circle",
            ShapeType::Edge => "edge",
            ShapeType::Polygon => "polygon",
            ShapeType::Chain => "chain",
        };
        f.write_str(name)
    }
}

/// Collision geometry owned by a fixture.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    Circle(CircleShape),
    Edge(EdgeShape),
    Polygon(PolygonShape),
    Chain(ChainShape),
}

impl Shape {
    #[inline(always)]
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Edge(_) => ShapeType::Edge,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::Chain(_) => ShapeType::Chain,
        }
    }

    /// Number of child primitives. Only chains have more than one.
    #[inline(always)]
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(chain) => chain.child_count(),
            _ => 1,
        }
    }

    /// Skin radius. For circles this is the circle radius.
    #[inline(always)]
    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(circle) => circle.radius(),
            Shape::Edge(edge) => edge.radius(),
            Shape::Polygon(polygon) => polygon.radius(),
            Shape::Chain(chain) => chain.radius(),
        }
    }

    #[inline(always)]
    pub fn density(&self) -> f32 {
        match self {
            Shape::Circle(circle) => circle.density(),
            Shape::Edge(edge) => edge.density(),
            Shape::Polygon(polygon) => polygon.density(),
            Shape::Chain(chain) => chain.density(),
        }
    }

    /// Sets the density and recomputes the mass data.
    pub fn set_density(&mut self, density: f32) -> Result<(), PhysicsError> {
        match self {
            Shape::Circle(circle) => circle.set_density(density),
            Shape::Edge(edge) => edge.set_density(density),
            Shape::Polygon(polygon) => polygon.set_density(density),
            Shape::Chain(chain) => chain.set_density(density),
        }
    }

    #[inline(always)]
    pub fn mass_data(&self) -> MassData {
        match self {
            Shape::Circle(circle) => *circle.mass_data(),
            Shape::Polygon(polygon) => *polygon.mass_data(),
            Shape::Edge(edge) => edge.mass_data(),
            Shape::Chain(chain) => chain.mass_data(),
        }
    }

    /// Tests a world space point for containment. Edges and chains have no interior.
    pub fn test_point(&self, transform: &RigidPose, point: Vec2) -> bool {
        match self {
            Shape::Circle(circle) => circle.test_point(transform, point),
            Shape::Polygon(polygon) => polygon.test_point(transform, point),
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }

    /// Casts a world space segment against one child of the shape.
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        transform: &RigidPose,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(circle) => circle.ray_cast(input, transform),
            Shape::Edge(edge) => edge.ray_cast(input, transform),
            Shape::Polygon(polygon) => polygon.ray_cast(input, transform),
            Shape::Chain(chain) => chain.ray_cast(input, transform, child_index),
        }
    }

    /// World space bounds of one child of the shape.
    pub fn compute_aabb(&self, transform: &RigidPose, child_index: usize) -> BoundingBox {
        match self {
            Shape::Circle(circle) => circle.compute_aabb(transform),
            Shape::Edge(edge) => edge.compute_aabb(transform),
            Shape::Polygon(polygon) => polygon.compute_aabb(transform),
            Shape::Chain(chain) => chain.compute_aabb(transform, child_index),
        }
    }

    /// Bounds of the whole shape across every child.
    pub fn compute_full_aabb(&self, transform: &RigidPose) -> BoundingBox {
        let mut bounds = self.compute_aabb(transform, 0);
        for child in 1..self.child_count() {
            bounds = bounds.merged(&self.compute_aabb(transform, child));
        }
        bounds
    }

    /// Area and world space centroid of the part of the shape below the plane
    /// `dot(normal, x) = offset`. Edges and chains enclose no area.
    pub fn compute_submerged_area(
        &self,
        normal: Vec2,
        offset: f32,
        transform: &RigidPose,
    ) -> (f32, Vec2) {
        match self {
            Shape::Circle(circle) => circle.compute_submerged_area(normal, offset, transform),
            Shape::Polygon(polygon) => polygon.compute_submerged_area(normal, offset, transform),
            Shape::Edge(_) | Shape::Chain(_) => (0.0, Vec2::ZERO),
        }
    }

    /// Compares geometry, ignoring density.
    pub fn compare_to(&self, other: &Shape) -> bool {
        match (self, other) {
            (Shape::Circle(a), Shape::Circle(b)) => a.compare_to(b),
            (Shape::Edge(a), Shape::Edge(b)) => a.compare_to(b),
            (Shape::Polygon(a), Shape::Polygon(b)) => a.compare_to(b),
            (Shape::Chain(a), Shape::Chain(b)) => a.compare_to(b),
            _ => false,
        }
    }
}

impl From<CircleShape> for Shape {
    fn from(shape: CircleShape) -> Self {
        Shape::Circle(shape)
    }
}

impl From<EdgeShape> for Shape {
    fn from(shape: EdgeShape) -> Self {
        Shape::Edge(shape)
    }
}

impl From<PolygonShape> for Shape {
    fn from(shape: PolygonShape) -> Self {
        Shape::Polygon(shape)
    }
}

impl From<ChainShape> for Shape {
    fn from(shape: ChainShape) -> Self {
        Shape::Chain(shape)
    }
}
