use tracing::debug;

use crate::error::PhysicsError;
use crate::physics::body_set::BodySet;
use crate::physics::collidables::fixture::{mix_friction, mix_restitution, FixtureSet};
use crate::physics::handles::{BodyHandle, ContactHandle, FixtureHandle};

use super::collision_task_registry::ContactType;
use super::contact_manifold::{Manifold, WorldManifold};
use super::narrow_phase::NarrowPhase;
use super::narrow_phase_callbacks::{ContactCallbacks, VetoPolicy};

/// Node of a body's contact list. Each contact owns two of these, one per body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEdge {
    /// The body on the other side of the contact.
    pub other: BodyHandle,
    pub prev: Option<ContactHandle>,
    pub next: Option<ContactHandle>,
}

impl ContactEdge {
    fn new(other: BodyHandle) -> Self {
        Self {
            other,
            prev: None,
            next: None,
        }
    }
}

/// Persistent contact between two fixture children whose bounds overlap.
///
/// A contact exists while the broadphase bounds overlap, which may be well before the shapes
/// touch. Fixture A and child A always hold the shape that comes first in the narrow phase
/// order, so the manifold normal points from A to B.
#[derive(Debug, Clone)]
pub struct Contact {
    pub(crate) fixture_a: FixtureHandle,
    pub(crate) fixture_b: FixtureHandle,
    pub(crate) child_index_a: usize,
    pub(crate) child_index_b: usize,
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) manifold: Manifold,
    pub(crate) node_a: ContactEdge,
    pub(crate) node_b: ContactEdge,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) tangent_speed: f32,
    pub(crate) contact_type: ContactType,
    pub(crate) enabled: bool,
    pub(crate) touching: bool,
    /// Set when the fixtures' filters changed and the pair must be re-checked.
    pub(crate) filter_flag: bool,
}

impl Contact {
    /// Creates a contact for a pair that is already in narrow phase order.
    pub(crate) fn new(
        fixtures: &FixtureSet,
        fixture_a: FixtureHandle,
        child_index_a: usize,
        fixture_b: FixtureHandle,
        child_index_b: usize,
        contact_type: ContactType,
    ) -> Result<Self, PhysicsError> {
        let a = fixtures.get(fixture_a).ok_or(PhysicsError::InvalidHandle {
            kind: "fixture",
            index: fixture_a.0,
        })?;
        let b = fixtures.get(fixture_b).ok_or(PhysicsError::InvalidHandle {
            kind: "fixture",
            index: fixture_b.0,
        })?;
        Ok(Self {
            fixture_a,
            fixture_b,
            child_index_a,
            child_index_b,
            body_a: a.body(),
            body_b: b.body(),
            manifold: Manifold::default(),
            node_a: ContactEdge::new(b.body()),
            node_b: ContactEdge::new(a.body()),
            friction: mix_friction(a.friction(), b.friction()),
            restitution: mix_restitution(a.restitution(), b.restitution()),
            tangent_speed: 0.0,
            contact_type,
            enabled: true,
            touching: false,
            filter_flag: false,
        })
    }

    #[inline(always)]
    pub fn fixture_a(&self) -> FixtureHandle {
        self.fixture_a
    }

    #[inline(always)]
    pub fn fixture_b(&self) -> FixtureHandle {
        self.fixture_b
    }

    #[inline(always)]
    pub fn child_index_a(&self) -> usize {
        self.child_index_a
    }

    #[inline(always)]
    pub fn child_index_b(&self) -> usize {
        self.child_index_b
    }

    #[inline(always)]
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    #[inline(always)]
    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// Gets the body on the other side of the contact from `body`.
    pub fn other_body(&self, body: BodyHandle) -> BodyHandle {
        if body == self.body_a {
            self.body_b
        } else {
            self.body_a
        }
    }

    #[inline(always)]
    pub fn contact_type(&self) -> ContactType {
        self.contact_type
    }

    /// Gets the local manifold. Empty for sensors and for pairs that are not touching.
    #[inline(always)]
    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    #[inline(always)]
    pub fn manifold_mut(&mut self) -> &mut Manifold {
        &mut self.manifold
    }

    #[inline(always)]
    pub fn is_touching(&self) -> bool {
        self.touching
    }

    #[inline(always)]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disables the contact for the current step. Re-enabled at the next update.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[inline(always)]
    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    /// Restores the friction mixed from the fixtures.
    pub fn reset_friction(&mut self, fixtures: &FixtureSet) {
        if let (Some(a), Some(b)) = (fixtures.get(self.fixture_a), fixtures.get(self.fixture_b)) {
            self.friction = mix_friction(a.friction(), b.friction());
        }
    }

    #[inline(always)]
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    /// Restores the restitution mixed from the fixtures.
    pub fn reset_restitution(&mut self, fixtures: &FixtureSet) {
        if let (Some(a), Some(b)) = (fixtures.get(self.fixture_a), fixtures.get(self.fixture_b)) {
            self.restitution = mix_restitution(a.restitution(), b.restitution());
        }
    }

    /// Desired relative surface speed along the tangent, in meters per second. Conveyor belts.
    #[inline(always)]
    pub fn tangent_speed(&self) -> f32 {
        self.tangent_speed
    }

    pub fn set_tangent_speed(&mut self, speed: f32) {
        self.tangent_speed = speed;
    }

    /// Marks the pair for a filter re-check on the next collide pass.
    pub fn flag_for_filtering(&mut self) {
        self.filter_flag = true;
    }

    /// Gets the manifold in world space using the current body transforms.
    pub fn world_manifold(&self, bodies: &BodySet, fixtures: &FixtureSet) -> Option<WorldManifold> {
        let body_a = bodies.get(self.body_a)?;
        let body_b = bodies.get(self.body_b)?;
        let shape_a = fixtures.get(self.fixture_a)?.shape();
        let shape_b = fixtures.get(self.fixture_b)?.shape();
        Some(WorldManifold::initialize(
            &self.manifold,
            body_a.pose(),
            shape_a.radius(),
            body_b.pose(),
            shape_b.radius(),
        ))
    }

    /// List node belonging to `body`, if the body is part of this contact.
    pub(crate) fn edge(&self, body: BodyHandle) -> Option<&ContactEdge> {
        if body == self.body_a {
            Some(&self.node_a)
        } else if body == self.body_b {
            Some(&self.node_b)
        } else {
            None
        }
    }

    pub(crate) fn edge_mut(&mut self, body: BodyHandle) -> Option<&mut ContactEdge> {
        if body == self.body_a {
            Some(&mut self.node_a)
        } else if body == self.body_b {
            Some(&mut self.node_b)
        } else {
            None
        }
    }

    /// Recomputes the manifold from the current transforms and raises lifecycle events.
    ///
    /// Impulses of points whose feature id persists are carried over for warm starting. A
    /// contact that begins touching is offered to the fixture handlers and then to the global
    /// listener, combined according to `policy`; a disabled result leaves it not touching so it
    /// is offered again next time. A contact that stops touching notifies the separation
    /// handlers and then the global listener.
    pub(crate) fn update(
        &mut self,
        fixtures: &mut FixtureSet,
        bodies: &mut BodySet,
        narrow_phase: &mut NarrowPhase,
        callbacks: &mut dyn ContactCallbacks,
        policy: VetoPolicy,
    ) {
        let old_manifold = self.manifold;

        // Re-enable this contact.
        self.enabled = true;

        let was_touching = self.touching;

        let (Some(fixture_a), Some(fixture_b)) =
            (fixtures.get(self.fixture_a), fixtures.get(self.fixture_b))
        else {
            return;
        };
        let (Some(body_a), Some(body_b)) = (bodies.get(self.body_a), bodies.get(self.body_b))
        else {
            return;
        };
        let xf_a = *body_a.pose();
        let xf_b = *body_b.pose();
        let sensor = fixture_a.is_sensor() || fixture_b.is_sensor();

        let touching = if sensor {
            self.manifold.point_count = 0;
            narrow_phase.test_overlap(
                fixture_a.shape(),
                self.child_index_a,
                &xf_a,
                fixture_b.shape(),
                self.child_index_b,
                &xf_b,
            )
        } else {
            narrow_phase.evaluate(
                &mut self.manifold,
                fixture_a.shape(),
                self.child_index_a,
                &xf_a,
                fixture_b.shape(),
                self.child_index_b,
                &xf_b,
            );
            let touching = self.manifold.point_count > 0;

            // Match old contact ids to new contact ids and copy the stored impulses to warm
            // start the solver.
            for point in self.manifold.points_mut() {
                point.normal_impulse = 0.0;
                point.tangent_impulse = 0.0;
                let key = point.id.key();
                if let Some(old) = old_manifold.points().iter().find(|old| old.id.key() == key) {
                    point.normal_impulse = old.normal_impulse;
                    point.tangent_impulse = old.tangent_impulse;
                }
            }

            if touching != was_touching {
                for handle in [self.body_a, self.body_b] {
                    if let Some(body) = bodies.get_mut(handle) {
                        body.set_awake(true);
                    }
                }
            }
            touching
        };

        self.touching = touching;

        if !was_touching && touching {
            let enabled = self.report_begin(fixtures, bodies, callbacks, policy);
            if !enabled {
                // Leave the pair not touching so the handlers are consulted again next step.
                self.touching = false;
            }
            debug!(
                fixture_a = %self.fixture_a,
                fixture_b = %self.fixture_b,
                enabled,
                "contact began"
            );
        } else if was_touching && !touching {
            self.report_end(fixtures, bodies, callbacks);
            debug!(fixture_a = %self.fixture_a, fixture_b = %self.fixture_b, "contact ended");
        }

        if !sensor && self.touching {
            callbacks.pre_solve(self, &old_manifold, bodies);
        }
    }

    /// Runs every begin-touch handler in order and returns whether the contact stays enabled.
    fn report_begin(
        &self,
        fixtures: &mut FixtureSet,
        bodies: &mut BodySet,
        callbacks: &mut dyn ContactCallbacks,
        policy: VetoPolicy,
    ) -> bool {
        let mut enabled = true;
        for (own, other) in [
            (self.fixture_a, self.fixture_b),
            (self.fixture_b, self.fixture_a),
        ] {
            if let Some(fixture) = fixtures.get_mut(own) {
                for handler in fixture.on_collision.iter_mut() {
                    let vote = handler(own, other, self);
                    enabled = policy.fold(enabled, vote);
                }
            }
        }

        match policy {
            VetoPolicy::AllMustAgree => {
                if enabled {
                    enabled = callbacks.begin_contact(self, bodies);
                }
            }
            VetoPolicy::LastHandlerWins => {
                enabled = callbacks.begin_contact(self, bodies);
            }
        }
        enabled
    }

    /// Runs every end-touch handler in order. Also used when a touching contact is destroyed.
    pub(crate) fn report_end(
        &self,
        fixtures: &mut FixtureSet,
        bodies: &mut BodySet,
        callbacks: &mut dyn ContactCallbacks,
    ) {
        for (own, other) in [
            (self.fixture_a, self.fixture_b),
            (self.fixture_b, self.fixture_a),
        ] {
            if let Some(fixture) = fixtures.get_mut(own) {
                for handler in fixture.on_separation.iter_mut() {
                    handler(own, other, self);
                }
            }
        }
        callbacks.end_contact(self, bodies);
    }
}
