use glam::Vec2;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::physics::body_properties::RigidPose;
use crate::physics::settings::{LINEAR_SLOP, POLYGON_RADIUS};
use crate::utilities::BoundingBox;

use super::edge::EdgeShape;
use super::ray::{RayCastInput, RayCastOutput};
use super::shape::{validate_density, MassData};

/// Free-form sequence of line segments sharing one vertex buffer.
///
/// Each segment behaves like an [`EdgeShape`] whose ghost vertices come from its neighbors, so
/// objects sliding across segment joints do not catch on internal vertices. A loop stores its
/// first vertex again at the end and links its ends to each other; an open chain takes its end
/// ghost vertices from [`ChainShape::set_prev_vertex`] and [`ChainShape::set_next_vertex`].
///
/// Cloning a chain shares the vertex buffer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChainShape {
    vertices: Arc<[Vec2]>,
    prev_vertex: Option<Vec2>,
    next_vertex: Option<Vec2>,
    is_loop: bool,
    radius: f32,
    density: f32,
}

impl ChainShape {
    /// Creates a closed loop. The first vertex must not be repeated at the end.
    pub fn new_loop(vertices: &[Vec2]) -> Result<Self, PhysicsError> {
        validate_vertices(vertices, true)?;
        let mut stored = Vec::with_capacity(vertices.len() + 1);
        stored.extend_from_slice(vertices);
        stored.push(vertices[0]);
        let count = stored.len();
        Ok(Self {
            prev_vertex: Some(stored[count - 2]),
            next_vertex: Some(stored[1]),
            vertices: stored.into(),
            is_loop: true,
            radius: POLYGON_RADIUS,
            density: 0.0,
        })
    }

    /// Creates an open chain. Ghost vertices at the two ends start out unset.
    pub fn new_chain(vertices: &[Vec2]) -> Result<Self, PhysicsError> {
        Self::from_shared_vertices(vertices.into())
    }

    /// Creates an open chain over a buffer that other chains may also reference.
    pub fn from_shared_vertices(vertices: Arc<[Vec2]>) -> Result<Self, PhysicsError> {
        validate_vertices(&vertices, false)?;
        Ok(Self {
            vertices,
            prev_vertex: None,
            next_vertex: None,
            is_loop: false,
            radius: POLYGON_RADIUS,
            density: 0.0,
        })
    }

    /// Sets the ghost vertex before the first vertex of an open chain.
    pub fn set_prev_vertex(&mut self, prev_vertex: Option<Vec2>) -> Result<(), PhysicsError> {
        if self.is_loop {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "loop chains derive their ghost vertices",
            });
        }
        self.prev_vertex = prev_vertex;
        Ok(())
    }

    /// Sets the ghost vertex after the last vertex of an open chain.
    pub fn set_next_vertex(&mut self, next_vertex: Option<Vec2>) -> Result<(), PhysicsError> {
        if self.is_loop {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "loop chains derive their ghost vertices",
            });
        }
        self.next_vertex = next_vertex;
        Ok(())
    }

    #[inline(always)]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// The shared vertex buffer.
    #[inline(always)]
    pub fn shared_vertices(&self) -> &Arc<[Vec2]> {
        &self.vertices
    }

    #[inline(always)]
    pub fn prev_vertex(&self) -> Option<Vec2> {
        self.prev_vertex
    }

    #[inline(always)]
    pub fn next_vertex(&self) -> Option<Vec2> {
        self.next_vertex
    }

    #[inline(always)]
    pub fn is_loop(&self) -> bool {
        self.is_loop
    }

    /// One child per segment.
    #[inline(always)]
    pub fn child_count(&self) -> usize {
        self.vertices.len() - 1
    }

    #[inline(always)]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline(always)]
    pub fn density(&self) -> f32 {
        self.density
    }

    pub fn set_density(&mut self, density: f32) -> Result<(), PhysicsError> {
        validate_density(density)?;
        self.density = density;
        Ok(())
    }

    #[inline(always)]
    pub fn mass_data(&self) -> MassData {
        MassData::default()
    }

    /// Writes segment `index` into `edge`, including the ghost vertices taken from the
    /// neighboring segments or, at the chain ends, from the chain's own ghost links.
    pub fn get_child_edge(&self, index: usize, edge: &mut EdgeShape) {
        debug_assert!(index < self.child_count());
        let v = &self.vertices;
        edge.set(v[index], v[index + 1]);

        let vertex0 = if index > 0 {
            Some(v[index - 1])
        } else {
            self.prev_vertex
        };
        let vertex3 = if index + 2 < v.len() {
            Some(v[index + 2])
        } else {
            self.next_vertex
        };
        edge.set_vertex0(vertex0);
        edge.set_vertex3(vertex3);
    }

    /// Returns segment `index` as a standalone edge.
    pub fn child_edge(&self, index: usize) -> EdgeShape {
        let mut edge = EdgeShape::default();
        self.get_child_edge(index, &mut edge);
        edge
    }

    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        transform: &RigidPose,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        let edge = EdgeShape::new(
            self.vertices[child_index],
            self.vertices[child_index + 1],
        );
        edge.ray_cast(input, transform)
    }

    pub fn compute_aabb(&self, transform: &RigidPose, child_index: usize) -> BoundingBox {
        let v1 = transform.transform(self.vertices[child_index]);
        let v2 = transform.transform(self.vertices[child_index + 1]);
        BoundingBox::new(v1.min(v2), v1.max(v2)).expanded(self.radius)
    }

    pub fn compare_to(&self, other: &ChainShape) -> bool {
        self.radius == other.radius
            && self.is_loop == other.is_loop
            && self.prev_vertex == other.prev_vertex
            && self.next_vertex == other.next_vertex
            && self.vertices == other.vertices
    }
}

fn validate_vertices(vertices: &[Vec2], is_loop: bool) -> Result<(), PhysicsError> {
    if vertices.len() < 3 {
        return Err(PhysicsError::TooFewVertices {
            shape: "chain",
            count: vertices.len(),
            minimum: 3,
        });
    }
    let segment_count = if is_loop {
        vertices.len()
    } else {
        vertices.len() - 1
    };
    for index in 0..segment_count {
        let v1 = vertices[index];
        let v2 = vertices[(index + 1) % vertices.len()];
        if v1.distance_squared(v2) <= LINEAR_SLOP * LINEAR_SLOP {
            return Err(PhysicsError::DegenerateEdge { index });
        }
    }
    Ok(())
}
