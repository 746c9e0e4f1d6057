use glam::Vec2;

use crate::error::PhysicsError;
use crate::physics::body_description::{BodyDescription, BodyType};
use crate::physics::body_properties::{BodyInertia, BodyVelocity, RigidPose, Rot, Sweep};
use crate::physics::collidables::fixture::FixtureSet;
use crate::physics::handles::{BodyHandle, ContactHandle, FixtureHandle};
use crate::utilities::math_helper::cross_sv;
use crate::utilities::memory::IdPool;

/// Rigid body state read and written by the contact layer and solver.
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) body_type: BodyType,
    /// Transform of the body origin.
    pub(crate) pose: RigidPose,
    /// Center of mass motion over the current step.
    pub(crate) sweep: Sweep,
    /// Velocity of the center of mass.
    pub(crate) velocity: BodyVelocity,
    pub(crate) inertia: BodyInertia,
    pub(crate) mass: f32,
    /// Rotational inertia about the center of mass.
    pub(crate) rotational_inertia: f32,
    pub(crate) awake: bool,
    pub(crate) fixtures: Vec<FixtureHandle>,
    /// Head of the intrusive list of contacts touching this body.
    pub(crate) contact_list: Option<ContactHandle>,
    /// Slot in the solver's body arrays during a step.
    pub(crate) solver_index: usize,
}

impl Body {
    fn new(description: &BodyDescription) -> Self {
        let pose = description.pose;
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: pose.position,
            c: pose.position,
            a0: pose.rotation.angle(),
            a: pose.rotation.angle(),
            alpha0: 0.0,
        };
        let velocity = match description.body_type {
            BodyType::Static => BodyVelocity::default(),
            _ => description.velocity,
        };
        let (mass, inverse_mass) = match description.body_type {
            BodyType::Dynamic => (1.0, 1.0),
            _ => (0.0, 0.0),
        };
        Self {
            body_type: description.body_type,
            pose,
            sweep,
            velocity,
            inertia: BodyInertia {
                inverse_mass,
                inverse_inertia: 0.0,
            },
            mass,
            rotational_inertia: 0.0,
            awake: description.awake && description.body_type != BodyType::Static,
            fixtures: Vec::new(),
            contact_list: None,
            solver_index: 0,
        }
    }

    #[inline(always)]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    #[inline(always)]
    pub fn pose(&self) -> &RigidPose {
        &self.pose
    }

    #[inline(always)]
    pub fn position(&self) -> Vec2 {
        self.pose.position
    }

    #[inline(always)]
    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    /// World position of the center of mass.
    #[inline(always)]
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    /// Center of mass in body space.
    #[inline(always)]
    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    #[inline(always)]
    pub fn sweep(&self) -> &Sweep {
        &self.sweep
    }

    #[inline(always)]
    pub fn velocity(&self) -> BodyVelocity {
        self.velocity
    }

    /// Sets the center of mass velocity. Ignored for static bodies.
    pub fn set_velocity(&mut self, velocity: BodyVelocity) {
        if self.body_type == BodyType::Static {
            return;
        }
        if velocity.linear.length_squared() > 0.0 || velocity.angular != 0.0 {
            self.set_awake(true);
        }
        self.velocity = velocity;
    }

    #[inline(always)]
    pub fn inertia(&self) -> BodyInertia {
        self.inertia
    }

    #[inline(always)]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Rotational inertia about the center of mass.
    #[inline(always)]
    pub fn rotational_inertia(&self) -> f32 {
        self.rotational_inertia
    }

    #[inline(always)]
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Static bodies never wake. Putting a body to sleep clears its velocity.
    pub fn set_awake(&mut self, awake: bool) {
        if self.body_type == BodyType::Static {
            return;
        }
        if !awake {
            self.velocity = BodyVelocity::default();
        }
        self.awake = awake;
    }

    #[inline(always)]
    pub fn fixtures(&self) -> &[FixtureHandle] {
        &self.fixtures
    }

    /// Teleports the body origin. Contacts pick the new transform up on the next step.
    pub fn set_transform(&mut self, position: Vec2, angle: f32) {
        self.pose = RigidPose::new(position, angle);
        self.sweep.c = self.pose.transform(self.sweep.local_center);
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }

    /// Applies an impulse at a world point, waking the body.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        self.set_awake(true);
        self.velocity.linear += self.inertia.inverse_mass * impulse;
        self.velocity.angular +=
            self.inertia.inverse_inertia * (point - self.sweep.c).perp_dot(impulse);
    }

    /// Rebuilds the body pose from the sweep's end state.
    pub(crate) fn synchronize_transform(&mut self) {
        self.pose.rotation = Rot::from_angle(self.sweep.a);
        self.pose.position = self.sweep.c - self.pose.rotation.apply(self.sweep.local_center);
    }

    /// Recomputes mass, center of mass and rotational inertia from the attached fixtures.
    /// Non-dynamic bodies get zero mass. A dynamic body with massless fixtures gets unit mass
    /// so it still responds to contacts.
    pub(crate) fn reset_mass_data(&mut self, fixtures: &FixtureSet) {
        self.mass = 0.0;
        self.rotational_inertia = 0.0;
        self.inertia = BodyInertia::default();
        self.sweep.local_center = Vec2::ZERO;

        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.pose.position;
            self.sweep.c = self.pose.position;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        let mut local_center = Vec2::ZERO;
        let mut inertia = 0.0;
        for fixture in self.fixtures.iter().filter_map(|h| fixtures.get(*h)) {
            let mass_data = fixture.shape().mass_data();
            if mass_data.mass == 0.0 {
                continue;
            }
            self.mass += mass_data.mass;
            local_center += mass_data.mass * mass_data.centroid;
            inertia += mass_data.inertia;
        }

        if self.mass > 0.0 {
            self.inertia.inverse_mass = 1.0 / self.mass;
            local_center *= self.inertia.inverse_mass;
        } else {
            self.mass = 1.0;
            self.inertia.inverse_mass = 1.0;
        }

        if inertia > 0.0 {
            // Shift from the body origin to the center of mass.
            self.rotational_inertia = inertia - self.mass * local_center.dot(local_center);
            debug_assert!(self.rotational_inertia > 0.0);
            self.inertia.inverse_inertia = 1.0 / self.rotational_inertia;
        }

        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.pose.transform(local_center);
        self.sweep.c0 = self.sweep.c;

        // Keep the velocity of the body origin unchanged.
        self.velocity.linear += cross_sv(self.velocity.angular, self.sweep.c - old_center);
    }
}

/// Collection of all bodies, addressed by [`BodyHandle`].
#[derive(Debug, Default)]
pub struct BodySet {
    bodies: Vec<Option<Body>>,
    handle_pool: IdPool,
}

impl BodySet {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            bodies: Vec::with_capacity(initial_capacity),
            handle_pool: IdPool::new(initial_capacity),
        }
    }

    pub(crate) fn add(&mut self, description: &BodyDescription) -> BodyHandle {
        let id = self.handle_pool.take();
        let index = id as usize;
        if index >= self.bodies.len() {
            self.bodies.resize_with(index + 1, || None);
        }
        self.bodies[index] = Some(Body::new(description));
        BodyHandle(id)
    }

    pub(crate) fn remove(&mut self, handle: BodyHandle) -> Result<Body, PhysicsError> {
        let body = self
            .bodies
            .get_mut(handle.0 as usize)
            .and_then(Option::take)
            .ok_or(PhysicsError::InvalidHandle {
                kind: "body",
                index: handle.0,
            })?;
        self.handle_pool.return_id(handle.0);
        Ok(body)
    }

    #[inline(always)]
    pub fn get(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle.0 as usize).and_then(Option::as_ref)
    }

    #[inline(always)]
    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle.0 as usize).and_then(Option::as_mut)
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.bodies
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|b| (BodyHandle(i as u32), b)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyHandle, &mut Body)> {
        self.bodies
            .iter_mut()
            .enumerate()
            .filter_map(|(i, b)| b.as_mut().map(|b| (BodyHandle(i as u32), b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::circle::CircleShape;
    use crate::physics::collidables::fixture::FixtureDescription;
    use crate::physics::collidables::polygon::PolygonShape;

    #[test]
    fn dynamic_mass_comes_from_fixtures() {
        let mut bodies = BodySet::new(1);
        let mut fixtures = FixtureSet::new(2);
        let handle = bodies.add(&BodyDescription::create_dynamic(
            Vec2::new(1.0, 0.0),
            BodyVelocity::default(),
        ));
        let circle = CircleShape::with_position(Vec2::new(1.0, 0.0), 1.0, 1.0).unwrap();
        let square = PolygonShape::new_box(1.0, 1.0, 1.0).unwrap();
        let circle_mass = circle.mass_data().mass;
        let square_mass = square.mass_data().mass;
        let a = fixtures.add(handle, FixtureDescription::new(circle));
        let b = fixtures.add(handle, FixtureDescription::new(square));

        let body = bodies.get_mut(handle).unwrap();
        body.fixtures.extend([a, b]);
        body.reset_mass_data(&fixtures);

        let total = circle_mass + square_mass;
        assert!((body.mass() - total).abs() < 1e-4);
        let expected_center = Vec2::new(circle_mass / total, 0.0);
        assert!((body.local_center() - expected_center).length() < 1e-5);
        assert!((body.world_center() - (Vec2::new(1.0, 0.0) + expected_center)).length() < 1e-5);
        assert!(body.inertia().inverse_inertia > 0.0);
    }

    #[test]
    fn massless_dynamic_body_gets_unit_mass() {
        let mut bodies = BodySet::new(1);
        let fixtures = FixtureSet::new(0);
        let handle = bodies.add(&BodyDescription::create_dynamic(Vec2::ZERO, BodyVelocity::default()));
        let body = bodies.get_mut(handle).unwrap();
        body.reset_mass_data(&fixtures);
        assert_eq!(body.inertia().inverse_mass, 1.0);
        assert_eq!(body.inertia().inverse_inertia, 0.0);
    }

    #[test]
    fn static_bodies_stay_still_and_asleep() {
        let mut bodies = BodySet::new(1);
        let handle = bodies.add(&BodyDescription::create_static(Vec2::ZERO));
        let body = bodies.get_mut(handle).unwrap();
        body.set_awake(true);
        body.set_velocity(BodyVelocity::new(Vec2::X, 0.0));
        assert!(!body.is_awake());
        assert_eq!(body.velocity().linear, Vec2::ZERO);
        assert_eq!(body.inertia().inverse_mass, 0.0);
    }

    #[test]
    fn stale_handles_are_rejected() {
        let mut bodies = BodySet::new(1);
        let handle = bodies.add(&BodyDescription::default());
        bodies.remove(handle).unwrap();
        assert!(bodies.get(handle).is_none());
        assert!(matches!(
            bodies.remove(handle),
            Err(PhysicsError::InvalidHandle { kind: "body", .. })
        ));
    }

    #[test]
    fn set_transform_moves_center_of_mass() {
        let mut bodies = BodySet::new(1);
        let handle = bodies.add(&BodyDescription::create_dynamic(Vec2::ZERO, BodyVelocity::default()));
        let body = bodies.get_mut(handle).unwrap();
        body.sweep.local_center = Vec2::new(1.0, 0.0);
        body.set_transform(Vec2::new(0.0, 2.0), std::f32::consts::FRAC_PI_2);
        assert!((body.world_center() - Vec2::new(0.0, 3.0)).length() < 1e-5);
        body.synchronize_transform();
        assert!((body.position() - Vec2::new(0.0, 2.0)).length() < 1e-5);
    }
}
