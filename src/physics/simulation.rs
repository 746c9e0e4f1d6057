use std::fmt;

use glam::Vec2;
use tracing::{debug, info, trace};

use crate::error::PhysicsError;
use crate::physics::body_description::{BodyDescription, BodyType};
use crate::physics::body_properties::{RigidPose, SolverPosition, SolverVelocity};
use crate::physics::body_set::{Body, BodySet};
use crate::physics::collidables::fixture::{CollisionFilter, Fixture, FixtureDescription, FixtureSet};
use crate::physics::collidables::shape::Shape;
use crate::physics::collision_detection::contact::Contact;
use crate::physics::collision_detection::narrow_phase::NarrowPhase;
use crate::physics::collision_detection::narrow_phase_callbacks::ContactCallbacks;
use crate::physics::collision_detection::pair_cache::PairCache;
use crate::physics::collision_detection::spatial_hash::{RaycastHit, ShapeLookup, SpatialHash};
use crate::physics::constraints::contact::contact_solver::ContactSolver;
use crate::physics::handles::{BodyHandle, ContactHandle, FixtureHandle, FixtureProxy};
use crate::physics::settings::SimulationSettings;
use crate::physics::solve_description::TimeStep;
use crate::utilities::BoundingBox;

/// Resolves fixture proxies to their shapes and body transforms for exact spatial queries.
struct ProxyShapes<'a> {
    bodies: &'a BodySet,
    fixtures: &'a FixtureSet,
}

impl ShapeLookup<FixtureProxy> for ProxyShapes<'_> {
    fn lookup(&self, proxy: FixtureProxy) -> Option<(&Shape, usize, RigidPose)> {
        let fixture = self.fixtures.get(proxy.fixture)?;
        let body = self.bodies.get(fixture.body())?;
        Some((fixture.shape(), proxy.child_index as usize, *body.pose()))
    }
}

/// Owns the bodies, fixtures, contacts and broadphase of one world and advances them in time.
///
/// Each [`step`](Simulation::step) refreshes the broadphase, updates contacts, solves velocity
/// and position constraints, and integrates the bodies. Contact events are delivered to the
/// callbacks of type `C` synchronously during the step.
pub struct Simulation<C: ContactCallbacks> {
    settings: SimulationSettings,
    bodies: BodySet,
    fixtures: FixtureSet,
    contacts: PairCache,
    broad_phase: SpatialHash<FixtureProxy>,
    solver: ContactSolver,
    callbacks: C,
    /// Inverse of the previous step length, 0 before the first step.
    previous_inv_dt: f32,

    positions: Vec<SolverPosition>,
    velocities: Vec<SolverVelocity>,
    active_contacts: Vec<ContactHandle>,
    proxy_scratch: Vec<FixtureProxy>,
    pair_scratch: Vec<(FixtureProxy, FixtureProxy)>,
}

impl<C: ContactCallbacks> fmt::Debug for Simulation<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("settings", &self.settings)
            .field("bodies", &self.bodies.len())
            .field("fixtures", &self.fixtures.len())
            .field("contacts", &self.contacts.len())
            .field("proxies", &self.broad_phase.len())
            .finish()
    }
}

impl<C: ContactCallbacks> Simulation<C> {
    /// Creates an empty simulation.
    ///
    /// # Arguments
    /// * `settings` - Solver, broadphase and query configuration. Validated before use.
    /// * `callbacks` - Receives contact lifecycle events.
    pub fn new(settings: SimulationSettings, callbacks: C) -> Result<Self, PhysicsError> {
        settings.validate()?;
        let broad_phase = SpatialHash::new(settings.cell_size)?;
        info!(
            cell_size = settings.cell_size,
            velocity_iterations = settings.velocity_iterations,
            position_iterations = settings.position_iterations,
            veto_policy = ?settings.veto_policy,
            "created simulation"
        );
        Ok(Self {
            settings,
            bodies: BodySet::new(64),
            fixtures: FixtureSet::new(64),
            contacts: PairCache::new(128, NarrowPhase::default()),
            broad_phase,
            solver: ContactSolver::new(&settings),
            callbacks,
            previous_inv_dt: 0.0,
            positions: Vec::new(),
            velocities: Vec::new(),
            active_contacts: Vec::new(),
            proxy_scratch: Vec::new(),
            pair_scratch: Vec::new(),
        })
    }

    #[inline(always)]
    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Replaces the settings. Changing the cell size rebuilds the broadphase.
    pub fn set_settings(&mut self, settings: SimulationSettings) -> Result<(), PhysicsError> {
        settings.validate()?;
        if settings.cell_size != self.settings.cell_size {
            let mut broad_phase = SpatialHash::new(settings.cell_size)?;
            for (handle, fixture) in self.fixtures.iter() {
                let Some(body) = self.bodies.get(fixture.body()) else {
                    continue;
                };
                for child in 0..fixture.shape().child_count() {
                    broad_phase.register(
                        FixtureProxy::new(handle, child as u32),
                        fixture.shape().compute_aabb(body.pose(), child),
                        fixture.layer(),
                    );
                }
            }
            debug!(
                from = self.settings.cell_size,
                to = settings.cell_size,
                proxies = broad_phase.len(),
                "rebuilt spatial hash"
            );
            self.broad_phase = broad_phase;
        }
        self.solver.set_settings(&settings);
        self.settings = settings;
        Ok(())
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.settings.gravity = gravity;
    }

    #[inline(always)]
    pub fn callbacks(&self) -> &C {
        &self.callbacks
    }

    #[inline(always)]
    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }

    #[inline(always)]
    pub fn bodies(&self) -> &BodySet {
        &self.bodies
    }

    #[inline(always)]
    pub fn fixtures(&self) -> &FixtureSet {
        &self.fixtures
    }

    #[inline(always)]
    pub fn contacts(&self) -> &PairCache {
        &self.contacts
    }

    #[inline(always)]
    pub fn broad_phase(&self) -> &SpatialHash<FixtureProxy> {
        &self.broad_phase
    }

    #[inline(always)]
    pub fn solver(&self) -> &ContactSolver {
        &self.solver
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    /// Mutable access to a body. Transform changes are picked up by the broadphase on the next
    /// step.
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle)
    }

    pub fn fixture(&self, handle: FixtureHandle) -> Option<&Fixture> {
        self.fixtures.get(handle)
    }

    pub fn fixture_mut(&mut self, handle: FixtureHandle) -> Option<&mut Fixture> {
        self.fixtures.get_mut(handle)
    }

    pub fn contact(&self, handle: ContactHandle) -> Option<&Contact> {
        self.contacts.get(handle)
    }

    pub fn contact_mut(&mut self, handle: ContactHandle) -> Option<&mut Contact> {
        self.contacts.get_mut(handle)
    }

    /// Iterates over the contacts attached to a body.
    pub fn contacts_of(&self, body: BodyHandle) -> impl Iterator<Item = (ContactHandle, &Contact)> {
        self.contacts.contacts_of(&self.bodies, body)
    }

    pub fn add_body(&mut self, description: &BodyDescription) -> BodyHandle {
        let handle = self.bodies.add(description);
        trace!(body = %handle, body_type = ?description.body_type, "added body");
        handle
    }

    /// Removes a body together with its fixtures and contacts. Touching contacts report their
    /// end first.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Result<Body, PhysicsError> {
        if !self.bodies.contains(handle) {
            return Err(PhysicsError::InvalidHandle {
                kind: "body",
                index: handle.0,
            });
        }
        let attached: Vec<ContactHandle> = self
            .contacts
            .contacts_of(&self.bodies, handle)
            .map(|(contact, _)| contact)
            .collect();
        for contact in attached {
            self.contacts.destroy(
                contact,
                &mut self.fixtures,
                &mut self.bodies,
                &mut self.callbacks,
            )?;
        }

        let fixtures = self
            .bodies
            .get(handle)
            .map(|b| b.fixtures().to_vec())
            .unwrap_or_default();
        for fixture in fixtures {
            self.unregister_proxies(fixture);
            self.fixtures.remove(fixture)?;
        }
        let body = self.bodies.remove(handle)?;
        trace!(body = %handle, "removed body");
        Ok(body)
    }

    /// Attaches a fixture to a body, registers one broadphase proxy per shape child and
    /// recomputes the body's mass.
    pub fn add_fixture(
        &mut self,
        body: BodyHandle,
        description: FixtureDescription,
    ) -> Result<FixtureHandle, PhysicsError> {
        let Some(pose) = self.bodies.get(body).map(|b| *b.pose()) else {
            return Err(PhysicsError::InvalidHandle {
                kind: "body",
                index: body.0,
            });
        };
        let handle = self.fixtures.add(body, description);
        if let Some(fixture) = self.fixtures.get(handle) {
            for child in 0..fixture.shape().child_count() {
                self.broad_phase.register(
                    FixtureProxy::new(handle, child as u32),
                    fixture.shape().compute_aabb(&pose, child),
                    fixture.layer(),
                );
            }
        }
        if let Some(b) = self.bodies.get_mut(body) {
            b.fixtures.push(handle);
            b.reset_mass_data(&self.fixtures);
        }
        trace!(fixture = %handle, body = %body, "added fixture");
        Ok(handle)
    }

    /// Detaches a fixture, destroying its contacts and proxies.
    pub fn remove_fixture(&mut self, handle: FixtureHandle) -> Result<Fixture, PhysicsError> {
        let Some(body) = self.fixtures.get(handle).map(|f| f.body()) else {
            return Err(PhysicsError::InvalidHandle {
                kind: "fixture",
                index: handle.0,
            });
        };
        self.contacts.destroy_fixture_contacts(
            handle,
            &mut self.fixtures,
            &mut self.bodies,
            &mut self.callbacks,
        );
        self.unregister_proxies(handle);
        let fixture = self.fixtures.remove(handle)?;
        if let Some(b) = self.bodies.get_mut(body) {
            b.fixtures.retain(|f| *f != handle);
            b.reset_mass_data(&self.fixtures);
        }
        Ok(fixture)
    }

    /// Changes a fixture's collision filter. Existing contacts of its body are filtered again
    /// on the next step.
    pub fn set_filter(
        &mut self,
        handle: FixtureHandle,
        filter: CollisionFilter,
    ) -> Result<(), PhysicsError> {
        let Some(fixture) = self.fixtures.get_mut(handle) else {
            return Err(PhysicsError::InvalidHandle {
                kind: "fixture",
                index: handle.0,
            });
        };
        fixture.filter = filter;
        let body = fixture.body();
        self.contacts.flag_body_for_filtering(&self.bodies, body);
        Ok(())
    }

    /// Moves a fixture to other spatial hash layers.
    pub fn set_layer(&mut self, handle: FixtureHandle, layer: u32) -> Result<(), PhysicsError> {
        let Some(fixture) = self.fixtures.get_mut(handle) else {
            return Err(PhysicsError::InvalidHandle {
                kind: "fixture",
                index: handle.0,
            });
        };
        fixture.layer = layer;
        let child_count = fixture.shape().child_count();
        for child in 0..child_count {
            let proxy = FixtureProxy::new(handle, child as u32);
            if let Some(bounds) = self.broad_phase.registered_bounds(proxy) {
                self.broad_phase.register(proxy, bounds, layer);
            }
        }
        Ok(())
    }

    fn unregister_proxies(&mut self, handle: FixtureHandle) {
        let child_count = self
            .fixtures
            .get(handle)
            .map_or(0, |f| f.shape().child_count());
        for child in 0..child_count {
            self.broad_phase.remove(FixtureProxy::new(handle, child as u32));
        }
    }

    /// Advances the simulation by `dt`.
    ///
    /// Contacts are updated even for a zero step; the solver and integrator only run when
    /// `dt > 0`. Changes made to bodies inside contact callbacks are seen by the next step.
    pub fn step(&mut self, dt: f32) -> Result<(), PhysicsError> {
        let step = TimeStep::new(dt, self.previous_inv_dt, &self.settings)?;

        self.update_pairs();

        let Self {
            contacts,
            fixtures,
            bodies,
            broad_phase,
            callbacks,
            settings,
            ..
        } = self;
        contacts.collide(
            fixtures,
            bodies,
            |a, b| broad_phase.proxies_overlap(a, b),
            callbacks,
            settings.veto_policy,
        );

        if step.dt > 0.0 {
            self.solve(&step);
            self.previous_inv_dt = step.inv_dt;
        }
        Ok(())
    }

    /// Refreshes every proxy's bounds and creates contacts for new overlaps of moving bodies.
    fn update_pairs(&mut self) {
        self.pair_scratch.clear();
        for (_, body) in self.bodies.iter() {
            for &handle in body.fixtures() {
                let Some(fixture) = self.fixtures.get(handle) else {
                    continue;
                };
                for child in 0..fixture.shape().child_count() {
                    let proxy = FixtureProxy::new(handle, child as u32);
                    let bounds = fixture.shape().compute_aabb(body.pose(), child);
                    self.broad_phase.update(proxy, bounds);
                }
            }
        }

        for (_, body) in self.bodies.iter() {
            if body.body_type() == BodyType::Static || !body.is_awake() {
                continue;
            }
            for &handle in body.fixtures() {
                let Some(fixture) = self.fixtures.get(handle) else {
                    continue;
                };
                for child in 0..fixture.shape().child_count() {
                    let proxy = FixtureProxy::new(handle, child as u32);
                    let Some(bounds) = self.broad_phase.registered_bounds(proxy) else {
                        continue;
                    };
                    self.proxy_scratch.clear();
                    self.broad_phase.aabb_broadphase(
                        &bounds,
                        Some(proxy),
                        u32::MAX,
                        &mut self.proxy_scratch,
                    );
                    self.pair_scratch
                        .extend(self.proxy_scratch.iter().map(|&other| (proxy, other)));
                }
            }
        }

        let mut created = 0;
        for &(proxy_a, proxy_b) in &self.pair_scratch {
            if self
                .contacts
                .add_pair(proxy_a, proxy_b, &self.fixtures, &mut self.bodies)
                .is_some()
            {
                created += 1;
            }
        }
        if created > 0 {
            trace!(created, candidates = self.pair_scratch.len(), "new contacts");
        }
    }

    fn solve(&mut self, step: &TimeStep) {
        let h = step.dt;
        let gravity = self.settings.gravity;

        self.positions.clear();
        self.velocities.clear();
        for (i, (_, body)) in self.bodies.iter_mut().enumerate() {
            body.solver_index = i;
            body.sweep.c0 = body.sweep.c;
            body.sweep.a0 = body.sweep.a;

            let mut v = body.velocity.linear;
            let w = body.velocity.angular;
            if body.body_type == BodyType::Dynamic && body.awake {
                v += h * gravity;
            }
            self.positions.push(SolverPosition {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            self.velocities.push(SolverVelocity { v, w });
        }

        self.active_contacts.clear();
        for (handle, contact) in self.contacts.iter() {
            if !contact.is_touching() || !contact.is_enabled() {
                continue;
            }
            let sensor = |fixture| self.fixtures.get(fixture).map_or(true, Fixture::is_sensor);
            if sensor(contact.fixture_a()) || sensor(contact.fixture_b()) {
                continue;
            }
            self.active_contacts.push(handle);
        }

        self.solver.reset(
            step,
            &self.contacts,
            &self.active_contacts,
            &self.fixtures,
            &self.bodies,
        );
        self.solver
            .initialize_velocity_constraints(&self.contacts, &self.positions, &self.velocities);
        if step.warm_starting {
            self.solver.warm_start(&mut self.velocities);
        }
        for _ in 0..step.velocity_iterations {
            self.solver.solve_velocity_constraints(&mut self.velocities);
        }
        self.solver.store_impulses(&mut self.contacts);

        // Integrate positions, clamping large motions.
        let max_translation = self.settings.max_translation;
        let max_rotation = self.settings.max_rotation;
        for (_, body) in self.bodies.iter() {
            if body.body_type() == BodyType::Static {
                continue;
            }
            let i = body.solver_index;
            let SolverVelocity { mut v, mut w } = self.velocities[i];

            let translation = h * v;
            if translation.length_squared() > max_translation * max_translation {
                v *= max_translation / translation.length();
            }
            let rotation = h * w;
            if rotation * rotation > max_rotation * max_rotation {
                w *= max_rotation / rotation.abs();
            }

            self.positions[i].c += h * v;
            self.positions[i].a += h * w;
            self.velocities[i] = SolverVelocity { v, w };
        }

        let mut converged = false;
        let mut iterations = 0;
        while iterations < step.position_iterations {
            iterations += 1;
            if self.solver.solve_position_constraints(&mut self.positions) {
                converged = true;
                break;
            }
        }
        if !converged && self.solver.count() > 0 {
            debug!(
                iterations,
                constraints = self.solver.count(),
                "position correction did not converge"
            );
        }

        for (_, body) in self.bodies.iter_mut() {
            if body.body_type == BodyType::Static {
                continue;
            }
            let i = body.solver_index;
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.velocity.linear = self.velocities[i].v;
            body.velocity.angular = self.velocities[i].w;
            body.synchronize_transform();
        }

        for (handle, impulse) in self.solver.impulses() {
            if let Some(contact) = self.contacts.get(handle) {
                self.callbacks.post_solve(contact, &impulse);
            }
        }

        trace!(
            bodies = self.bodies.len(),
            contacts = self.contacts.len(),
            constraints = self.solver.count(),
            "stepped"
        );
    }

    /// Casts a segment from `start` to `end` against fixtures in `layer_mask`. Hits are
    /// appended to `hits` in order of distance, at most `max_hits` of them.
    pub fn ray_cast(
        &mut self,
        start: Vec2,
        end: Vec2,
        layer_mask: u32,
        hits: &mut Vec<RaycastHit<FixtureProxy>>,
        max_hits: usize,
    ) -> usize {
        let shapes = ProxyShapes {
            bodies: &self.bodies,
            fixtures: &self.fixtures,
        };
        self.broad_phase.linecast(
            start,
            end,
            layer_mask,
            self.settings.raycasts_start_in_colliders,
            &shapes,
            hits,
            max_hits,
        )
    }

    /// Collects the proxies whose bounds overlap `bounds`.
    pub fn query_aabb(
        &mut self,
        bounds: &BoundingBox,
        layer_mask: u32,
        results: &mut Vec<FixtureProxy>,
    ) -> usize {
        self.broad_phase
            .aabb_broadphase(bounds, None, layer_mask, results)
    }

    /// Collects the proxies whose shapes overlap a circle.
    pub fn overlap_circle(
        &mut self,
        center: Vec2,
        radius: f32,
        layer_mask: u32,
        results: &mut Vec<FixtureProxy>,
    ) -> Result<usize, PhysicsError> {
        let shapes = ProxyShapes {
            bodies: &self.bodies,
            fixtures: &self.fixtures,
        };
        self.broad_phase.overlap_circle(
            center,
            radius,
            layer_mask,
            &shapes,
            self.contacts.narrow_phase_mut(),
            results,
        )
    }

    /// Collects the proxies whose shapes overlap an axis aligned rectangle.
    pub fn overlap_rectangle(
        &mut self,
        rectangle: &BoundingBox,
        layer_mask: u32,
        results: &mut Vec<FixtureProxy>,
    ) -> Result<usize, PhysicsError> {
        let shapes = ProxyShapes {
            bodies: &self.bodies,
            fixtures: &self.fixtures,
        };
        self.broad_phase.overlap_rectangle(
            rectangle,
            layer_mask,
            &shapes,
            self.contacts.narrow_phase_mut(),
            results,
        )
    }

    /// Removes every contact, fixture and body.
    pub fn clear(&mut self) {
        self.contacts.clear(&mut self.bodies);
        self.broad_phase.clear();
        self.fixtures = FixtureSet::new(64);
        self.bodies = BodySet::new(64);
        self.previous_inv_dt = 0.0;
    }
}
