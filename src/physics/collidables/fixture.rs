use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::physics::collision_detection::contact::Contact;
use crate::physics::handles::{BodyHandle, FixtureHandle};
use crate::utilities::memory::IdPool;

use super::shape::Shape;

/// Called when a fixture starts touching another. Receives the fixture the handler is
/// registered on, the other fixture and the contact. Returning false vetoes the contact.
pub type CollisionHandler = Box<dyn FnMut(FixtureHandle, FixtureHandle, &Contact) -> bool>;

/// Called when a fixture stops touching another.
pub type SeparationHandler = Box<dyn FnMut(FixtureHandle, FixtureHandle, &Contact)>;

/// Category/mask/group collision filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollisionFilter {
    /// Bits this fixture belongs to.
    pub category_bits: u16,
    /// Categories this fixture accepts collisions with.
    pub mask_bits: u16,
    /// Fixtures sharing a nonzero group always collide (positive) or never collide (negative).
    pub group_index: i16,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl CollisionFilter {
    /// Group rules win over the category/mask test.
    #[inline(always)]
    pub fn should_collide(&self, other: &CollisionFilter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }
        (self.mask_bits & other.category_bits) != 0 && (other.mask_bits & self.category_bits) != 0
    }
}

/// Mixes the friction of two fixtures. A frictionless fixture makes the pair frictionless.
#[inline(always)]
pub fn mix_friction(friction_a: f32, friction_b: f32) -> f32 {
    (friction_a * friction_b).sqrt()
}

/// Mixes the restitution of two fixtures. Anything bouncy makes the pair bouncy.
#[inline(always)]
pub fn mix_restitution(restitution_a: f32, restitution_b: f32) -> f32 {
    restitution_a.max(restitution_b)
}

/// Describes a fixture to attach to a body.
#[derive(Debug, Clone)]
pub struct FixtureDescription {
    pub shape: Shape,
    pub friction: f32,
    pub restitution: f32,
    /// Sensors report overlap but never generate a contact response.
    pub is_sensor: bool,
    pub filter: CollisionFilter,
    /// Layer bits used by spatial hash queries.
    pub layer: u32,
}

impl FixtureDescription {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            friction: 0.2,
            restitution: 0.0,
            is_sensor: false,
            filter: CollisionFilter::default(),
            layer: 1,
        }
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn as_sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }

    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }
}

/// Shape attached to a body, together with its material and filtering properties.
pub struct Fixture {
    pub(crate) body: BodyHandle,
    pub(crate) shape: Shape,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) is_sensor: bool,
    pub(crate) filter: CollisionFilter,
    pub(crate) layer: u32,
    /// Invoked in registration order when this fixture starts touching another.
    pub(crate) on_collision: Vec<CollisionHandler>,
    /// Invoked in registration order when this fixture stops touching another.
    pub(crate) on_separation: Vec<SeparationHandler>,
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Fixture")
            .field("body", &self.body)
            .field("shape", &self.shape.shape_type())
            .field("friction", &self.friction)
            .field("restitution", &self.restitution)
            .field("is_sensor", &self.is_sensor)
            .field("filter", &self.filter)
            .field("layer", &self.layer)
            .field("on_collision", &self.on_collision.len())
            .field("on_separation", &self.on_separation.len())
            .finish()
    }
}

impl Fixture {
    fn new(body: BodyHandle, description: FixtureDescription) -> Self {
        Self {
            body,
            shape: description.shape,
            friction: description.friction,
            restitution: description.restitution,
            is_sensor: description.is_sensor,
            filter: description.filter,
            layer: description.layer,
            on_collision: Vec::new(),
            on_separation: Vec::new(),
        }
    }

    #[inline(always)]
    pub fn body(&self) -> BodyHandle {
        self.body
    }

    #[inline(always)]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline(always)]
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Affects contacts created after the change.
    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    #[inline(always)]
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Affects contacts created after the change.
    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    #[inline(always)]
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    pub fn set_sensor(&mut self, is_sensor: bool) {
        self.is_sensor = is_sensor;
    }

    #[inline(always)]
    pub fn filter(&self) -> CollisionFilter {
        self.filter
    }

    #[inline(always)]
    pub fn layer(&self) -> u32 {
        self.layer
    }

    /// Appends a begin-touch handler. Handlers run in registration order.
    pub fn add_collision_handler(
        &mut self,
        handler: impl FnMut(FixtureHandle, FixtureHandle, &Contact) -> bool + 'static,
    ) {
        self.on_collision.push(Box::new(handler));
    }

    /// Appends an end-touch handler. Handlers run in registration order.
    pub fn add_separation_handler(
        &mut self,
        handler: impl FnMut(FixtureHandle, FixtureHandle, &Contact) + 'static,
    ) {
        self.on_separation.push(Box::new(handler));
    }

    pub fn clear_handlers(&mut self) {
        self.on_collision.clear();
        self.on_separation.clear();
    }
}

/// Collection of all fixtures, addressed by [`FixtureHandle`].
#[derive(Debug, Default)]
pub struct FixtureSet {
    fixtures: Vec<Option<Fixture>>,
    handle_pool: IdPool,
}

impl FixtureSet {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            fixtures: Vec::with_capacity(initial_capacity),
            handle_pool: IdPool::new(initial_capacity),
        }
    }

    pub(crate) fn add(&mut self, body: BodyHandle, description: FixtureDescription) -> FixtureHandle {
        let id = self.handle_pool.take();
        let index = id as usize;
        if index >= self.fixtures.len() {
            self.fixtures.resize_with(index + 1, || None);
        }
        self.fixtures[index] = Some(Fixture::new(body, description));
        FixtureHandle(id)
    }

    pub(crate) fn remove(&mut self, handle: FixtureHandle) -> Result<Fixture, PhysicsError> {
        let fixture = self
            .fixtures
            .get_mut(handle.0 as usize)
            .and_then(Option::take)
            .ok_or(PhysicsError::InvalidHandle {
                kind: "fixture",
                index: handle.0,
            })?;
        self.handle_pool.return_id(handle.0);
        Ok(fixture)
    }

    #[inline(always)]
    pub fn get(&self, handle: FixtureHandle) -> Option<&Fixture> {
        self.fixtures.get(handle.0 as usize).and_then(Option::as_ref)
    }

    #[inline(always)]
    pub fn get_mut(&mut self, handle: FixtureHandle) -> Option<&mut Fixture> {
        self.fixtures
            .get_mut(handle.0 as usize)
            .and_then(Option::as_mut)
    }

    pub fn contains(&self, handle: FixtureHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.fixtures.iter().filter(|f| f.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (FixtureHandle, &Fixture)> {
        self.fixtures
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_ref().map(|f| (FixtureHandle(i as u32), f)))
    }

    /// Borrows two distinct fixtures mutably.
    pub(crate) fn get_pair_mut(
        &mut self,
        a: FixtureHandle,
        b: FixtureHandle,
    ) -> Option<(&mut Fixture, &mut Fixture)> {
        let (ia, ib) = (a.0 as usize, b.0 as usize);
        if ia == ib || ia.max(ib) >= self.fixtures.len() {
            return None;
        }
        let (low, high) = self.fixtures.split_at_mut(ia.max(ib));
        let (first, second) = (low[ia.min(ib)].as_mut()?, high[0].as_mut()?);
        if ia < ib {
            Some((first, second))
        } else {
            Some((second, first))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::circle::CircleShape;

    fn circle() -> FixtureDescription {
        FixtureDescription::new(CircleShape::new(1.0, 1.0).unwrap())
    }

    #[test]
    fn group_overrides_masks() {
        let a = CollisionFilter {
            group_index: 3,
            mask_bits: 0,
            ..Default::default()
        };
        assert!(a.should_collide(&a));
        let b = CollisionFilter {
            group_index: -3,
            ..Default::default()
        };
        assert!(!b.should_collide(&b));
    }

    #[test]
    fn masks_must_accept_each_other() {
        let a = CollisionFilter {
            category_bits: 0b01,
            mask_bits: 0b10,
            group_index: 0,
        };
        let b = CollisionFilter {
            category_bits: 0b10,
            mask_bits: 0b01,
            group_index: 0,
        };
        let c = CollisionFilter {
            category_bits: 0b10,
            mask_bits: 0b10,
            group_index: 0,
        };
        assert!(a.should_collide(&b));
        assert!(!a.should_collide(&c));
    }

    #[test]
    fn mixing_rules() {
        assert!((mix_friction(0.4, 0.9) - 0.6).abs() < 1e-6);
        assert_eq!(mix_friction(0.0, 1.0), 0.0);
        assert_eq!(mix_restitution(0.1, 0.7), 0.7);
    }

    #[test]
    fn handles_are_recycled() {
        let mut set = FixtureSet::new(4);
        let a = set.add(BodyHandle(0), circle());
        let b = set.add(BodyHandle(0), circle().as_sensor());
        assert_ne!(a, b);
        assert!(set.get(b).unwrap().is_sensor());
        set.remove(a).unwrap();
        assert!(set.get(a).is_none());
        assert!(matches!(
            set.remove(a),
            Err(PhysicsError::InvalidHandle { .. })
        ));
        let c = set.add(BodyHandle(1), circle());
        assert_eq!(c, a);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn pair_borrow_preserves_order() {
        let mut set = FixtureSet::new(4);
        let a = set.add(BodyHandle(0), circle().with_friction(0.1));
        let b = set.add(BodyHandle(1), circle().with_friction(0.9));
        let (fb, fa) = set.get_pair_mut(b, a).unwrap();
        assert_eq!(fb.friction(), 0.9);
        assert_eq!(fa.friction(), 0.1);
        assert!(set.get_pair_mut(a, a).is_none());
    }
}
