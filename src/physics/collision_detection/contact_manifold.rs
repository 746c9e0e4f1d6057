use glam::Vec2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::physics::body_properties::RigidPose;
use crate::physics::settings::MAX_MANIFOLD_POINTS;
use crate::utilities::math_helper::EPSILON;

/// Kind of geometric feature that produced a contact point.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ContactFeatureType {
    #[default]
    Vertex = 0,
    Face = 1,
}

/// Identifies the pair of features that intersect to form a contact point. Stable across
/// steps as long as the same features stay in contact, which is what warm starting keys on.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactFeature {
    /// Feature index on shape A.
    pub index_a: u8,
    /// Feature index on shape B.
    pub index_b: u8,
    pub type_a: ContactFeatureType,
    pub type_b: ContactFeatureType,
}

const _: () = {
    assert!(std::mem::size_of::<ContactFeature>() == 4);
};

impl ContactFeature {
    #[inline(always)]
    pub fn new(
        index_a: u8,
        index_b: u8,
        type_a: ContactFeatureType,
        type_b: ContactFeatureType,
    ) -> Self {
        Self {
            index_a,
            index_b,
            type_a,
            type_b,
        }
    }

    /// Packs the feature pair into one comparable value.
    #[inline(always)]
    pub fn key(&self) -> u32 {
        u32::from_le_bytes([
            self.index_a,
            self.index_b,
            self.type_a as u8,
            self.type_b as u8,
        ])
    }

    /// Swaps the roles of shape A and shape B.
    #[inline(always)]
    pub fn flipped(&self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

/// A contact point belonging to a manifold.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ManifoldPoint {
    /// Meaning depends on the manifold type:
    /// - Circles: the center of circle B
    /// - FaceA: the clip point on B, in B's frame
    /// - FaceB: the clip point on A, in A's frame
    pub local_point: Vec2,
    /// Accumulated non-penetration impulse.
    pub normal_impulse: f32,
    /// Accumulated friction impulse.
    pub tangent_impulse: f32,
    pub id: ContactFeature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// Contact points between two shapes, expressed in the frames of the shapes so that the
/// manifold stays valid under the small motions of a single step.
///
/// - Circles: `local_point` is the center of circle A, `local_normal` is unused
/// - FaceA: `local_point` is on the reference face of A, `local_normal` is its normal
/// - FaceB: `local_point` is on the reference face of B, `local_normal` is its normal
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub manifold_type: ManifoldType,
    pub point_count: usize,
}

impl Manifold {
    /// The live points.
    #[inline(always)]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    #[inline(always)]
    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }
}

/// Vertex produced while clipping an incident edge against a reference face.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: ContactFeature,
}

/// A manifold resolved into world space for the current transforms.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldManifold {
    /// Points from shape A to shape B.
    pub normal: Vec2,
    /// Midway between the two surfaces at each contact point.
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Negative when the shapes overlap.
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    /// Evaluates the manifold with the given transforms and skin radii.
    pub fn initialize(
        manifold: &Manifold,
        xf_a: &RigidPose,
        radius_a: f32,
        xf_b: &RigidPose,
        radius_b: f32,
    ) -> Self {
        let mut world = Self::default();
        if manifold.point_count == 0 {
            return world;
        }

        match manifold.manifold_type {
            ManifoldType::Circles => {
                world.normal = Vec2::X;
                let point_a = xf_a.transform(manifold.local_point);
                let point_b = xf_b.transform(manifold.points[0].local_point);
                if point_a.distance_squared(point_b) > EPSILON * EPSILON {
                    world.normal = (point_b - point_a).normalize();
                }

                let c_a = point_a + radius_a * world.normal;
                let c_b = point_b - radius_b * world.normal;
                world.points[0] = 0.5 * (c_a + c_b);
                world.separations[0] = (c_b - c_a).dot(world.normal);
            }
            ManifoldType::FaceA => {
                world.normal = xf_a.rotation.apply(manifold.local_normal);
                let plane_point = xf_a.transform(manifold.local_point);

                for (i, point) in manifold.points().iter().enumerate() {
                    let clip_point = xf_b.transform(point.local_point);
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(world.normal)) * world.normal;
                    let c_b = clip_point - radius_b * world.normal;
                    world.points[i] = 0.5 * (c_a + c_b);
                    world.separations[i] = (c_b - c_a).dot(world.normal);
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.rotation.apply(manifold.local_normal);
                let plane_point = xf_b.transform(manifold.local_point);

                for (i, point) in manifold.points().iter().enumerate() {
                    let clip_point = xf_a.transform(point.local_point);
                    let c_b = clip_point
                        + (radius_b - (clip_point - plane_point).dot(normal)) * normal;
                    let c_a = clip_point - radius_a * normal;
                    world.points[i] = 0.5 * (c_a + c_b);
                    world.separations[i] = (c_a - c_b).dot(normal);
                }

                // Keep the A-to-B convention.
                world.normal = -normal;
            }
        }
        world
    }
}
