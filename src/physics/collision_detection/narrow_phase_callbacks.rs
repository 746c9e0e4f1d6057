#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::physics::body_set::BodySet;
use crate::physics::settings::MAX_MANIFOLD_POINTS;

use super::contact::Contact;
use super::contact_manifold::Manifold;

/// How the votes of several begin-touch handlers combine into the contact's enabled flag.
///
/// Handlers always run in order: every collision handler of fixture A, then every collision
/// handler of fixture B, then [`ContactCallbacks::begin_contact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VetoPolicy {
    /// The contact is enabled only if every fixture handler votes true. All fixture handlers
    /// run even after a veto. The global listener is consulted only when both fixtures agree,
    /// and its vote is final.
    #[default]
    AllMustAgree,
    /// Each vote overwrites the previous one, so the last handler to run decides. The global
    /// listener always runs and always has the last word.
    LastHandlerWins,
}

impl VetoPolicy {
    /// Folds one fixture handler's vote into the running result.
    #[inline(always)]
    pub fn fold(self, current: bool, vote: bool) -> bool {
        match self {
            VetoPolicy::AllMustAgree => current && vote,
            VetoPolicy::LastHandlerWins => vote,
        }
    }
}

/// Impulses applied at each manifold point during the last velocity solve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactImpulse {
    pub normal_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

/// Defines handlers for contact lifecycle events.
///
/// Every method runs synchronously inside the step. Changes made to bodies here are seen by
/// the next step; the current step has already captured the state it solves with.
pub trait ContactCallbacks {
    /// Called when two fixtures begin to touch. Returning false disables the contact for this
    /// step; it will be offered again while the fixtures keep overlapping.
    fn begin_contact(&mut self, _contact: &Contact, _bodies: &mut BodySet) -> bool {
        true
    }

    /// Called when two fixtures cease to touch, and when a touching contact is destroyed.
    fn end_contact(&mut self, _contact: &Contact, _bodies: &mut BodySet) {}

    /// Called for every touching, non-sensor contact before the solver runs. The manifold
    /// passed in is the one from the previous step. Disabling the contact here skips it for
    /// the current step only.
    fn pre_solve(&mut self, _contact: &mut Contact, _old_manifold: &Manifold, _bodies: &mut BodySet) {}

    /// Called after the velocity solve with the impulses applied to the contact.
    fn post_solve(&mut self, _contact: &Contact, _impulse: &ContactImpulse) {}
}

/// Callbacks that accept every contact and ignore every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContactCallbacks;

impl ContactCallbacks for NoContactCallbacks {}
