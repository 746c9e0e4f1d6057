use glam::Vec2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::physics::body_properties::{BodyVelocity, RigidPose};

/// How a body participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyType {
    /// Zero mass, zero velocity, moved only by the user.
    Static,
    /// Zero mass, velocity set by the user, moved by the integrator.
    Kinematic,
    /// Positive mass derived from its fixtures, moved by forces and contacts.
    Dynamic,
}

/// Describes a body's initial state.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyDescription {
    pub body_type: BodyType,
    /// Position of the body origin and orientation of the body.
    pub pose: RigidPose,
    /// Linear velocity of the body origin and angular velocity.
    pub velocity: BodyVelocity,
    pub awake: bool,
}

impl BodyDescription {
    /// Creates a description for a dynamic body.
    #[inline(always)]
    pub fn create_dynamic(pose: impl Into<RigidPose>, velocity: BodyVelocity) -> Self {
        Self {
            body_type: BodyType::Dynamic,
            pose: pose.into(),
            velocity,
            awake: true,
        }
    }

    /// Creates a description for a kinematic body.
    #[inline(always)]
    pub fn create_kinematic(pose: impl Into<RigidPose>, velocity: BodyVelocity) -> Self {
        Self {
            body_type: BodyType::Kinematic,
            pose: pose.into(),
            velocity,
            awake: true,
        }
    }

    /// Creates a description for a static body.
    #[inline(always)]
    pub fn create_static(pose: impl Into<RigidPose>) -> Self {
        Self {
            body_type: BodyType::Static,
            pose: pose.into(),
            velocity: BodyVelocity::default(),
            awake: false,
        }
    }
}

impl Default for BodyDescription {
    fn default() -> Self {
        Self::create_static(Vec2::ZERO)
    }
}
