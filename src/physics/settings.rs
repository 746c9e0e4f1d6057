//! Global tuning constants and runtime simulation settings.

use glam::Vec2;
use std::f32::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::physics::collision_detection::narrow_phase_callbacks::VetoPolicy;

/// A small length used as a collision and constraint tolerance.
pub const LINEAR_SLOP: f32 = 0.005;

/// A small angle used as a collision and constraint tolerance.
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * PI;

/// Skin radius of polygons and edges, kept small so the solver works on a thin shell.
pub const POLYGON_RADIUS: f32 = 2.0 * LINEAR_SLOP;

/// The maximum number of vertices on a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// The maximum number of contact points between two convex shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// A velocity threshold for elastic collisions. Any collision with a relative linear
/// velocity below this threshold will be treated as inelastic.
pub const VELOCITY_THRESHOLD: f32 = 1.0;

/// The maximum linear position correction used when solving constraints.
pub const MAX_LINEAR_CORRECTION: f32 = 0.2;

/// Fraction of the overlap removed per position iteration.
pub const BAUMGARTE: f32 = 0.2;

/// Baumgarte factor for the time-of-impact position pass.
pub const TOI_BAUMGARTE: f32 = 0.75;

/// Two-point manifolds whose effective mass matrix is worse conditioned than this drop to one point.
pub const MAX_CONDITION_NUMBER: f32 = 1000.0;

/// The maximum linear translation of a body per step.
pub const MAX_TRANSLATION: f32 = 2.0;

/// The maximum angular rotation of a body per step.
pub const MAX_ROTATION: f32 = 0.5 * PI;

/// Runtime settings consumed by the contact layer, solver and broadphase.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationSettings {
    pub gravity: Vec2,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    /// Reuse the previous step's impulses as the starting guess.
    pub warm_starting: bool,
    pub linear_slop: f32,
    pub velocity_threshold: f32,
    pub max_linear_correction: f32,
    pub baumgarte: f32,
    pub toi_baumgarte: f32,
    pub max_condition_number: f32,
    pub max_translation: f32,
    pub max_rotation: f32,
    /// How the votes of several collision handlers are combined when a pair starts touching.
    pub veto_policy: VetoPolicy,
    /// Whether rays that start inside a collider report it as a hit.
    pub raycasts_start_in_colliders: bool,
    /// Edge length of a spatial hash cell.
    pub cell_size: f32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.8),
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting: true,
            linear_slop: LINEAR_SLOP,
            velocity_threshold: VELOCITY_THRESHOLD,
            max_linear_correction: MAX_LINEAR_CORRECTION,
            baumgarte: BAUMGARTE,
            toi_baumgarte: TOI_BAUMGARTE,
            max_condition_number: MAX_CONDITION_NUMBER,
            max_translation: MAX_TRANSLATION,
            max_rotation: MAX_ROTATION,
            veto_policy: VetoPolicy::AllMustAgree,
            raycasts_start_in_colliders: false,
            cell_size: 4.0,
        }
    }
}

impl SimulationSettings {
    /// Checks that every setting is usable by the solver and broadphase.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "gravity must be finite",
            });
        }
        if self.velocity_iterations == 0 {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "velocity iteration count must be positive",
            });
        }
        if !(self.linear_slop > 0.0) {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "linear slop must be positive",
            });
        }
        if !(self.baumgarte > 0.0 && self.baumgarte <= 1.0)
            || !(self.toi_baumgarte > 0.0 && self.toi_baumgarte <= 1.0)
        {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "baumgarte factors must be in (0, 1]",
            });
        }
        if !(self.max_linear_correction > 0.0) || !(self.max_condition_number > 0.0) {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "correction and conditioning limits must be positive",
            });
        }
        if !(self.cell_size > 0.0) || !self.cell_size.is_finite() {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "cell size must be positive and finite",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SimulationSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_cell_size_is_rejected() {
        let settings = SimulationSettings {
            cell_size: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(PhysicsError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn zero_velocity_iterations_is_rejected() {
        let settings = SimulationSettings {
            velocity_iterations: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
