#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::physics::settings::SimulationSettings;

/// Describes one simulation step as seen by the contact solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeStep {
    /// Time step length.
    pub dt: f32,
    /// Inverse time step (0 if dt == 0).
    pub inv_dt: f32,
    /// dt * inv_dt of the previous step. Scales warm-started impulses.
    pub dt_ratio: f32,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub warm_starting: bool,
}

impl TimeStep {
    /// Creates a step descriptor.
    ///
    /// # Arguments
    /// * `dt` - Length of this step.
    /// * `previous_inv_dt` - Inverse length of the previous step, or 0 for the first step.
    /// * `settings` - Source of the iteration counts and warm-starting toggle.
    pub fn new(
        dt: f32,
        previous_inv_dt: f32,
        settings: &SimulationSettings,
    ) -> Result<Self, PhysicsError> {
        if !(dt >= 0.0) || !dt.is_finite() {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "time step must be finite and non-negative",
            });
        }
        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        Ok(Self {
            dt,
            inv_dt,
            dt_ratio: previous_inv_dt * dt,
            velocity_iterations: settings.velocity_iterations,
            position_iterations: settings.position_iterations,
            warm_starting: settings.warm_starting,
        })
    }

    /// Creates a descriptor with a dt ratio of one, as for a fixed-rate simulation.
    pub fn fixed(dt: f32, settings: &SimulationSettings) -> Result<Self, PhysicsError> {
        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        Self::new(dt, inv_dt, settings)
    }
}
