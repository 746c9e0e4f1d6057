use tracing::{debug, trace};

use crate::error::PhysicsError;
use crate::physics::body_description::BodyType;
use crate::physics::body_set::{Body, BodySet};
use crate::physics::collidables::fixture::FixtureSet;
use crate::physics::handles::{BodyHandle, ContactHandle, FixtureHandle, FixtureProxy};
use crate::utilities::memory::IdPool;

use super::collision_task_registry::{requires_swap, ContactType};
use super::contact::Contact;
use super::narrow_phase::NarrowPhase;
use super::narrow_phase_callbacks::{ContactCallbacks, VetoPolicy};

#[derive(Debug, Default)]
struct ContactSlot {
    generation: u32,
    contact: Option<Contact>,
}

/// Owns every contact. Slots are pooled and addressed by generational [`ContactHandle`]s; each
/// body threads its contacts into an intrusive list whose head lives on the body.
#[derive(Debug, Default)]
pub struct PairCache {
    slots: Vec<ContactSlot>,
    id_pool: IdPool,
    narrow_phase: NarrowPhase,
    handle_scratch: Vec<ContactHandle>,
}

/// Bodies that can never move relative to each other do not need contacts.
fn bodies_should_collide(a: &Body, b: &Body) -> bool {
    a.body_type() == BodyType::Dynamic || b.body_type() == BodyType::Dynamic
}

impl PairCache {
    pub fn new(initial_capacity: usize, narrow_phase: NarrowPhase) -> Self {
        Self {
            slots: Vec::with_capacity(initial_capacity),
            id_pool: IdPool::new(initial_capacity),
            narrow_phase,
            handle_scratch: Vec::new(),
        }
    }

    #[inline(always)]
    pub fn narrow_phase(&self) -> &NarrowPhase {
        &self.narrow_phase
    }

    #[inline(always)]
    pub fn narrow_phase_mut(&mut self) -> &mut NarrowPhase {
        &mut self.narrow_phase
    }

    pub fn get(&self, handle: ContactHandle) -> Option<&Contact> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.contact.as_ref())
    }

    pub fn get_mut(&mut self, handle: ContactHandle) -> Option<&mut Contact> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.contact.as_mut())
    }

    pub fn contains(&self, handle: ContactHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.contact.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContactHandle, &Contact)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.contact
                .as_ref()
                .map(|c| (ContactHandle::new(i as u32, slot.generation), c))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ContactHandle, &mut Contact)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.contact
                .as_mut()
                .map(|c| (ContactHandle::new(i as u32, generation), c))
        })
    }

    /// Walks the contact list of a body.
    pub fn contacts_of<'a>(
        &'a self,
        bodies: &BodySet,
        body: BodyHandle,
    ) -> impl Iterator<Item = (ContactHandle, &'a Contact)> + 'a {
        let head = bodies.get(body).and_then(|b| b.contact_list);
        let mut next = head;
        std::iter::from_fn(move || {
            let handle = next?;
            let contact = self.get(handle)?;
            next = contact.edge(body).and_then(|edge| edge.next);
            Some((handle, contact))
        })
    }

    /// Creates a contact for two overlapping proxies unless one already exists or the pair is
    /// excluded. The new contact is stored in narrow phase order.
    pub fn add_pair(
        &mut self,
        proxy_a: FixtureProxy,
        proxy_b: FixtureProxy,
        fixtures: &FixtureSet,
        bodies: &mut BodySet,
    ) -> Option<ContactHandle> {
        if proxy_a.fixture == proxy_b.fixture {
            return None;
        }
        let fixture_a = fixtures.get(proxy_a.fixture)?;
        let fixture_b = fixtures.get(proxy_b.fixture)?;
        let (body_a, body_b) = (fixture_a.body(), fixture_b.body());
        if body_a == body_b {
            return None;
        }

        if self.find(fixtures, bodies, proxy_a, proxy_b).is_some() {
            return None;
        }

        if !bodies_should_collide(bodies.get(body_a)?, bodies.get(body_b)?) {
            return None;
        }
        if !fixture_a.filter().should_collide(&fixture_b.filter()) {
            return None;
        }

        let (type_a, type_b) = (fixture_a.shape().shape_type(), fixture_b.shape().shape_type());
        let contact_type = self.narrow_phase.contact_type(type_a, type_b);
        if contact_type == ContactType::NotSupported {
            return None;
        }

        let (first, second) = if requires_swap(type_a, type_b) {
            (proxy_b, proxy_a)
        } else {
            (proxy_a, proxy_b)
        };
        let contact = Contact::new(
            fixtures,
            first.fixture,
            first.child_index as usize,
            second.fixture,
            second.child_index as usize,
            contact_type,
        )
        .ok()?;

        if !fixture_a.is_sensor() && !fixture_b.is_sensor() {
            for handle in [body_a, body_b] {
                if let Some(body) = bodies.get_mut(handle) {
                    body.set_awake(true);
                }
            }
        }

        let handle = self.allocate(contact);
        self.link(handle, bodies);
        trace!(contact = %handle, proxy_a = %first, proxy_b = %second, "contact created");
        Some(handle)
    }

    /// Finds the contact between two proxies in either order.
    pub fn find(
        &self,
        fixtures: &FixtureSet,
        bodies: &BodySet,
        proxy_a: FixtureProxy,
        proxy_b: FixtureProxy,
    ) -> Option<ContactHandle> {
        let matches = |contact: &Contact, a: FixtureProxy, b: FixtureProxy| {
            contact.fixture_a() == a.fixture
                && contact.child_index_a() == a.child_index as usize
                && contact.fixture_b() == b.fixture
                && contact.child_index_b() == b.child_index as usize
        };
        // Any contact between the two lives on both bodies' lists.
        let body = fixtures.get(proxy_b.fixture)?.body();
        self.contacts_of(bodies, body)
            .find(|(_, c)| matches(c, proxy_a, proxy_b) || matches(c, proxy_b, proxy_a))
            .map(|(handle, _)| handle)
    }

    fn allocate(&mut self, contact: Contact) -> ContactHandle {
        let id = self.id_pool.take();
        let index = id as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, ContactSlot::default);
        }
        let slot = &mut self.slots[index];
        debug_assert!(slot.contact.is_none());
        slot.contact = Some(contact);
        ContactHandle::new(id, slot.generation)
    }

    /// Pushes the contact onto the front of both bodies' lists.
    fn link(&mut self, handle: ContactHandle, bodies: &mut BodySet) {
        let Some((body_a, body_b)) = self.get(handle).map(|c| (c.body_a(), c.body_b())) else {
            return;
        };
        for body in [body_a, body_b] {
            let Some(head) = bodies.get_mut(body).map(|b| b.contact_list.replace(handle)) else {
                continue;
            };
            if let Some(edge) = self.get_mut(handle).and_then(|c| c.edge_mut(body)) {
                edge.prev = None;
                edge.next = head;
            }
            if let Some(edge) = head
                .and_then(|h| self.get_mut(h))
                .and_then(|c| c.edge_mut(body))
            {
                edge.prev = Some(handle);
            }
        }
    }

    fn unlink(&mut self, handle: ContactHandle, bodies: &mut BodySet) {
        let Some((body_a, body_b)) = self.get(handle).map(|c| (c.body_a(), c.body_b())) else {
            return;
        };
        for body in [body_a, body_b] {
            let Some((prev, next)) = self
                .get(handle)
                .and_then(|c| c.edge(body))
                .map(|edge| (edge.prev, edge.next))
            else {
                continue;
            };
            match prev {
                Some(prev) => {
                    if let Some(edge) = self.get_mut(prev).and_then(|c| c.edge_mut(body)) {
                        edge.next = next;
                    }
                }
                None => {
                    if let Some(b) = bodies.get_mut(body) {
                        b.contact_list = next;
                    }
                }
            }
            if let Some(edge) = next.and_then(|n| self.get_mut(n)).and_then(|c| c.edge_mut(body)) {
                edge.prev = prev;
            }
        }
    }

    /// Removes a contact. A touching contact reports the end of contact first.
    pub fn destroy(
        &mut self,
        handle: ContactHandle,
        fixtures: &mut FixtureSet,
        bodies: &mut BodySet,
        callbacks: &mut dyn ContactCallbacks,
    ) -> Result<Contact, PhysicsError> {
        self.remove_contact(handle, fixtures, bodies, callbacks)
            .ok_or(PhysicsError::InvalidHandle {
                kind: "contact",
                index: handle.index,
            })
    }

    /// Ends, unlinks and recycles a contact. Returns `None` and changes nothing if the handle
    /// is stale.
    fn remove_contact(
        &mut self,
        handle: ContactHandle,
        fixtures: &mut FixtureSet,
        bodies: &mut BodySet,
        callbacks: &mut dyn ContactCallbacks,
    ) -> Option<Contact> {
        let contact = self.get(handle)?;
        if contact.is_touching() {
            contact.report_end(fixtures, bodies, callbacks);
        }

        self.unlink(handle, bodies);
        let slot = &mut self.slots[handle.index as usize];
        let contact = slot.contact.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.id_pool.return_id(handle.index);
        trace!(contact = %handle, "contact destroyed");
        Some(contact)
    }

    /// Destroys every contact that involves `fixture`.
    pub fn destroy_fixture_contacts(
        &mut self,
        fixture: FixtureHandle,
        fixtures: &mut FixtureSet,
        bodies: &mut BodySet,
        callbacks: &mut dyn ContactCallbacks,
    ) {
        let Some(body) = fixtures.get(fixture).map(|f| f.body()) else {
            return;
        };
        let mut doomed = std::mem::take(&mut self.handle_scratch);
        doomed.clear();
        doomed.extend(
            self.contacts_of(bodies, body)
                .filter(|(_, c)| c.fixture_a() == fixture || c.fixture_b() == fixture)
                .map(|(handle, _)| handle),
        );
        for &handle in &doomed {
            self.remove_contact(handle, fixtures, bodies, callbacks);
        }
        self.handle_scratch = doomed;
    }

    /// Flags every contact of a body for a filter re-check.
    pub fn flag_body_for_filtering(&mut self, bodies: &BodySet, body: BodyHandle) {
        let mut next = bodies.get(body).and_then(|b| b.contact_list);
        while let Some(handle) = next {
            let Some(contact) = self.get_mut(handle) else {
                break;
            };
            contact.flag_for_filtering();
            next = contact.edge(body).and_then(|edge| edge.next);
        }
    }

    /// Updates every contact. Contacts whose filters now reject the pair, or whose proxies no
    /// longer overlap according to `proxies_overlap`, are destroyed. Pairs where neither body is
    /// awake keep their previous state.
    pub fn collide(
        &mut self,
        fixtures: &mut FixtureSet,
        bodies: &mut BodySet,
        mut proxies_overlap: impl FnMut(FixtureProxy, FixtureProxy) -> bool,
        callbacks: &mut dyn ContactCallbacks,
        policy: VetoPolicy,
    ) {
        let mut handles = std::mem::take(&mut self.handle_scratch);
        handles.clear();
        handles.extend(self.iter().map(|(handle, _)| handle));

        let mut destroyed = 0;
        for &handle in &handles {
            let Some(contact) = self.get_mut(handle) else {
                continue;
            };
            let (fixture_a, fixture_b) = (contact.fixture_a(), contact.fixture_b());
            let proxy_a = FixtureProxy::new(fixture_a, contact.child_index_a() as u32);
            let proxy_b = FixtureProxy::new(fixture_b, contact.child_index_b() as u32);
            let (Some(body_a), Some(body_b)) =
                (bodies.get(contact.body_a()), bodies.get(contact.body_b()))
            else {
                continue;
            };

            if contact.filter_flag {
                let keep = bodies_should_collide(body_a, body_b)
                    && matches!(
                        (fixtures.get(fixture_a), fixtures.get(fixture_b)),
                        (Some(a), Some(b)) if a.filter().should_collide(&b.filter())
                    );
                if !keep {
                    if self.remove_contact(handle, fixtures, bodies, callbacks).is_some() {
                        destroyed += 1;
                    }
                    continue;
                }
                contact.filter_flag = false;
            }

            let active_a = body_a.is_awake() && body_a.body_type() != BodyType::Static;
            let active_b = body_b.is_awake() && body_b.body_type() != BodyType::Static;
            if !active_a && !active_b {
                continue;
            }

            if !proxies_overlap(proxy_a, proxy_b) {
                if self.remove_contact(handle, fixtures, bodies, callbacks).is_some() {
                    destroyed += 1;
                }
                continue;
            }

            let slot = &mut self.slots[handle.index as usize];
            if let Some(contact) = slot.contact.as_mut() {
                contact.update(fixtures, bodies, &mut self.narrow_phase, callbacks, policy);
            }
        }

        if destroyed > 0 {
            debug!(destroyed, remaining = handles.len() - destroyed, "contacts culled");
        }
        self.handle_scratch = handles;
    }

    /// Removes every contact without raising events.
    pub fn clear(&mut self, bodies: &mut BodySet) {
        for slot in &mut self.slots {
            if slot.contact.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.id_pool.clear();
        for (_, body) in bodies.iter_mut() {
            body.contact_list = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::physics::body_description::BodyDescription;
    use crate::physics::body_properties::BodyVelocity;
    use crate::physics::collidables::circle::CircleShape;
    use crate::physics::collidables::fixture::{CollisionFilter, FixtureDescription};
    use crate::physics::collidables::polygon::PolygonShape;
    use crate::physics::collidables::shape::ShapeType;
    use crate::physics::collision_detection::narrow_phase_callbacks::NoContactCallbacks;

    struct Scene {
        bodies: BodySet,
        fixtures: FixtureSet,
        cache: PairCache,
    }

    impl Scene {
        fn new() -> Self {
            Self {
                bodies: BodySet::new(4),
                fixtures: FixtureSet::new(4),
                cache: PairCache::default(),
            }
        }

        fn body(&mut self, description: BodyDescription, shape: FixtureDescription) -> FixtureProxy {
            let body = self.bodies.add(&description);
            let fixture = self.fixtures.add(body, shape);
            self.bodies.get_mut(body).unwrap().fixtures.push(fixture);
            FixtureProxy::new(fixture, 0)
        }

        fn dynamic_circle(&mut self, x: f32) -> FixtureProxy {
            self.body(
                BodyDescription::create_dynamic(Vec2::new(x, 0.0), BodyVelocity::default()),
                FixtureDescription::new(CircleShape::new(0.5, 1.0).unwrap()),
            )
        }

        fn add(&mut self, a: FixtureProxy, b: FixtureProxy) -> Option<ContactHandle> {
            self.cache.add_pair(a, b, &self.fixtures, &mut self.bodies)
        }

        fn list_len(&self, proxy: FixtureProxy) -> usize {
            let body = self.fixtures.get(proxy.fixture).unwrap().body();
            self.cache.contacts_of(&self.bodies, body).count()
        }
    }

    #[test]
    fn duplicate_pairs_are_ignored() {
        let mut scene = Scene::new();
        let a = scene.dynamic_circle(0.0);
        let b = scene.dynamic_circle(0.8);
        assert!(scene.add(a, b).is_some());
        assert!(scene.add(b, a).is_none());
        assert!(scene.add(a, a).is_none());
        assert_eq!(scene.cache.len(), 1);
    }

    #[test]
    fn static_pairs_and_filtered_pairs_are_skipped() {
        let mut scene = Scene::new();
        let ground = FixtureDescription::new(PolygonShape::new_box(1.0, 1.0, 0.0).unwrap());
        let a = scene.body(BodyDescription::create_static(Vec2::ZERO), ground.clone());
        let b = scene.body(BodyDescription::create_static(Vec2::X), ground);
        assert!(scene.add(a, b).is_none());

        let filter = CollisionFilter {
            group_index: -1,
            ..Default::default()
        };
        let c = scene.body(
            BodyDescription::create_dynamic(Vec2::ZERO, BodyVelocity::default()),
            FixtureDescription::new(CircleShape::new(0.5, 1.0).unwrap()).with_filter(filter),
        );
        let d = scene.body(
            BodyDescription::create_dynamic(Vec2::X, BodyVelocity::default()),
            FixtureDescription::new(CircleShape::new(0.5, 1.0).unwrap()).with_filter(filter),
        );
        assert!(scene.add(c, d).is_none());
        assert!(scene.add(a, c).is_some());
    }

    #[test]
    fn pairs_are_stored_in_narrow_phase_order() {
        let mut scene = Scene::new();
        let circle = scene.dynamic_circle(0.0);
        let square = scene.body(
            BodyDescription::create_static(Vec2::new(0.0, -1.0)),
            FixtureDescription::new(PolygonShape::new_box(1.0, 0.5, 0.0).unwrap()),
        );
        let handle = scene.add(circle, square).unwrap();
        let contact = scene.cache.get(handle).unwrap();
        assert_eq!(contact.fixture_a(), square.fixture);
        assert_eq!(contact.contact_type(), ContactType::PolygonAndCircle);
        let shape_a = scene.fixtures.get(contact.fixture_a()).unwrap().shape();
        assert_eq!(shape_a.shape_type(), ShapeType::Polygon);
    }

    #[test]
    fn lists_survive_removal_from_the_middle() {
        let mut scene = Scene::new();
        let hub = scene.dynamic_circle(0.0);
        let spokes: Vec<_> = (0..3).map(|i| scene.dynamic_circle(i as f32 * 0.1)).collect();
        let handles: Vec<_> = spokes
            .iter()
            .map(|&spoke| scene.add(hub, spoke).unwrap())
            .collect();
        assert_eq!(scene.list_len(hub), 3);

        scene
            .cache
            .destroy(
                handles[1],
                &mut scene.fixtures,
                &mut scene.bodies,
                &mut NoContactCallbacks,
            )
            .unwrap();
        assert_eq!(scene.list_len(hub), 2);
        assert_eq!(scene.list_len(spokes[1]), 0);
        assert_eq!(scene.list_len(spokes[0]), 1);
        assert!(!scene.cache.contains(handles[1]));
    }

    #[test]
    fn recycled_slots_reject_stale_handles() {
        let mut scene = Scene::new();
        let a = scene.dynamic_circle(0.0);
        let b = scene.dynamic_circle(0.5);
        let c = scene.dynamic_circle(1.0);
        let first = scene.add(a, b).unwrap();
        scene
            .cache
            .destroy(first, &mut scene.fixtures, &mut scene.bodies, &mut NoContactCallbacks)
            .unwrap();
        let second = scene.add(a, c).unwrap();
        assert_eq!(first.index, second.index);
        assert_ne!(first.generation, second.generation);
        assert!(scene.cache.get(first).is_none());
        assert!(scene
            .cache
            .destroy(first, &mut scene.fixtures, &mut scene.bodies, &mut NoContactCallbacks)
            .is_err());
    }

    #[derive(Default)]
    struct EndCounter(usize);

    impl ContactCallbacks for EndCounter {
        fn end_contact(&mut self, _contact: &Contact, _bodies: &mut BodySet) {
            self.0 += 1;
        }
    }

    #[test]
    fn stale_destroy_leaves_live_contacts_alone() {
        let mut scene = Scene::new();
        let a = scene.dynamic_circle(0.0);
        let b = scene.dynamic_circle(0.5);
        let c = scene.dynamic_circle(1.0);
        let first = scene.add(a, b).unwrap();
        let mut ends = EndCounter::default();
        scene
            .cache
            .destroy(first, &mut scene.fixtures, &mut scene.bodies, &mut ends)
            .unwrap();
        let second = scene.add(a, c).unwrap();

        let stale = scene
            .cache
            .destroy(first, &mut scene.fixtures, &mut scene.bodies, &mut ends);
        assert_eq!(
            stale.unwrap_err(),
            PhysicsError::InvalidHandle {
                kind: "contact",
                index: first.index
            }
        );
        assert!(scene.cache.contains(second));
        assert_eq!(scene.list_len(a), 1);
        assert_eq!(scene.list_len(c), 1);
        assert_eq!(ends.0, 0);
    }

    #[test]
    fn destroying_fixture_contacts_reports_each_end_once() {
        let mut scene = Scene::new();
        let a = scene.dynamic_circle(0.0);
        let b = scene.dynamic_circle(0.8);
        let c = scene.dynamic_circle(-0.8);
        scene.add(a, b).unwrap();
        scene.add(a, c).unwrap();
        let mut ends = EndCounter::default();
        scene.cache.collide(
            &mut scene.fixtures,
            &mut scene.bodies,
            |_, _| true,
            &mut ends,
            VetoPolicy::AllMustAgree,
        );
        assert!(scene.cache.iter().all(|(_, contact)| contact.is_touching()));

        scene
            .cache
            .destroy_fixture_contacts(a.fixture, &mut scene.fixtures, &mut scene.bodies, &mut ends);
        assert_eq!(ends.0, 2);
        assert!(scene.cache.is_empty());
        assert_eq!(scene.list_len(b), 0);
        assert_eq!(scene.list_len(c), 0);
    }

    #[test]
    fn collide_culls_pairs_whose_proxies_separate() {
        let mut scene = Scene::new();
        let a = scene.dynamic_circle(0.0);
        let b = scene.dynamic_circle(0.8);
        let handle = scene.add(a, b).unwrap();
        scene.cache.collide(
            &mut scene.fixtures,
            &mut scene.bodies,
            |_, _| true,
            &mut NoContactCallbacks,
            VetoPolicy::AllMustAgree,
        );
        assert!(scene.cache.get(handle).unwrap().is_touching());

        scene.cache.collide(
            &mut scene.fixtures,
            &mut scene.bodies,
            |_, _| false,
            &mut NoContactCallbacks,
            VetoPolicy::AllMustAgree,
        );
        assert!(scene.cache.is_empty());
        assert_eq!(scene.list_len(a), 0);
    }

    #[test]
    fn refiltered_pairs_are_destroyed() {
        let mut scene = Scene::new();
        let a = scene.dynamic_circle(0.0);
        let b = scene.dynamic_circle(0.8);
        scene.add(a, b).unwrap();
        scene.fixtures.get_mut(a.fixture).unwrap().filter.mask_bits = 0;
        let body = scene.fixtures.get(a.fixture).unwrap().body();
        scene.cache.flag_body_for_filtering(&scene.bodies, body);
        scene.cache.collide(
            &mut scene.fixtures,
            &mut scene.bodies,
            |_, _| true,
            &mut NoContactCallbacks,
            VetoPolicy::AllMustAgree,
        );
        assert!(scene.cache.is_empty());
    }
}
