use std::cell::Cell;
use std::f32::consts::PI;
use std::rc::Rc;

use glam::Vec2;
use rust_physics2d::physics::body_set::BodySet;
use rust_physics2d::physics::collision_detection::contact::Contact;
use rust_physics2d::physics::collision_detection::contact_manifold::ManifoldType;
use rust_physics2d::physics::collision_detection::spatial_hash::SpatialHash;
use rust_physics2d::physics::settings::LINEAR_SLOP;
use rust_physics2d::utilities::BoundingBox;
use rust_physics2d::{
    BodyDescription, BodyHandle, BodyVelocity, ChainShape, CircleShape, ContactCallbacks,
    EdgeShape, FixtureDescription, FixtureHandle, NoContactCallbacks, PolygonShape, Simulation,
    SimulationSettings, VetoPolicy,
};

const DT: f32 = 1.0 / 60.0;

fn weightless() -> SimulationSettings {
    SimulationSettings {
        gravity: Vec2::ZERO,
        ..Default::default()
    }
}

fn dynamic_circle<C: ContactCallbacks>(
    sim: &mut Simulation<C>,
    position: Vec2,
    velocity: Vec2,
) -> (BodyHandle, FixtureHandle) {
    let body = sim.add_body(&BodyDescription::create_dynamic(
        position,
        BodyVelocity::new(velocity, 0.0),
    ));
    let fixture = sim
        .add_fixture(body, FixtureDescription::new(CircleShape::new(1.0, 1.0).unwrap()))
        .unwrap();
    (body, fixture)
}

#[test]
fn approaching_circles_stop_closing_after_one_iteration() {
    let settings = SimulationSettings {
        velocity_iterations: 1,
        ..weightless()
    };
    let mut sim = Simulation::new(settings, NoContactCallbacks).unwrap();
    let (a, _) = dynamic_circle(&mut sim, Vec2::ZERO, Vec2::new(1.0, 0.0));
    let (b, _) = dynamic_circle(&mut sim, Vec2::new(1.5, 0.0), Vec2::new(-1.0, 0.0));

    sim.step(DT).unwrap();

    let (_, contact) = sim.contacts_of(a).next().expect("contact between the circles");
    assert!(contact.is_touching());
    assert_eq!(contact.manifold().point_count, 1);
    assert_eq!(contact.manifold().manifold_type, ManifoldType::Circles);

    let va = sim.body(a).unwrap().velocity().linear;
    let vb = sim.body(b).unwrap().velocity().linear;
    let approach = (vb - va).x;
    assert!(approach > -2.0);
    assert!(approach > -1e-3, "still closing at {approach}");
    // Equal masses: momentum stays zero.
    assert!((va + vb).length() < 1e-4);
}

#[test]
fn octagon_rests_on_edge() {
    let mut sim = Simulation::new(SimulationSettings::default(), NoContactCallbacks).unwrap();
    let ground = sim.add_body(&BodyDescription::create_static(Vec2::ZERO));
    sim.add_fixture(
        ground,
        FixtureDescription::new(EdgeShape::new(Vec2::new(-50.0, 0.0), Vec2::new(50.0, 0.0))),
    )
    .unwrap();

    let vertices: Vec<Vec2> = (0..8)
        .map(|i| {
            let angle = PI / 8.0 + i as f32 * PI / 4.0;
            0.5 * Vec2::new(angle.cos(), angle.sin())
        })
        .collect();
    let apothem = 0.5 * (PI / 8.0).cos();
    let body = sim.add_body(&BodyDescription::create_dynamic(
        Vec2::new(0.0, apothem + 0.05),
        BodyVelocity::default(),
    ));
    sim.add_fixture(
        body,
        FixtureDescription::new(PolygonShape::new(&vertices, 1.0).unwrap()),
    )
    .unwrap();

    for _ in 0..120 {
        sim.step(DT).unwrap();
    }

    let (_, contact) = sim.contacts_of(body).next().expect("resting contact");
    assert!(contact.is_touching());
    assert_eq!(contact.manifold().point_count, 2);

    let world = contact
        .world_manifold(sim.bodies(), sim.fixtures())
        .expect("bodies are alive");
    for separation in &world.separations[..2] {
        assert!(*separation >= -3.0 * LINEAR_SLOP, "separation {separation}");
    }
    assert!(world.normal.y.abs() > 0.99);
    assert!(sim.body(body).unwrap().velocity().linear.length() < 0.05);
}

#[derive(Default)]
struct CountingListener {
    begins: usize,
    ends: usize,
    accept: bool,
}

impl ContactCallbacks for CountingListener {
    fn begin_contact(&mut self, _contact: &Contact, _bodies: &mut BodySet) -> bool {
        self.begins += 1;
        self.accept
    }

    fn end_contact(&mut self, _contact: &Contact, _bodies: &mut BodySet) {
        self.ends += 1;
    }
}

fn vetoed_pair(policy: VetoPolicy) -> (Simulation<CountingListener>, BodyHandle, Rc<Cell<usize>>) {
    let settings = SimulationSettings {
        veto_policy: policy,
        ..weightless()
    };
    let listener = CountingListener {
        accept: true,
        ..Default::default()
    };
    let mut sim = Simulation::new(settings, listener).unwrap();
    let (a, fixture_a) = dynamic_circle(&mut sim, Vec2::ZERO, Vec2::ZERO);
    dynamic_circle(&mut sim, Vec2::new(1.5, 0.0), Vec2::ZERO);

    let votes = Rc::new(Cell::new(0));
    let counter = Rc::clone(&votes);
    sim.fixture_mut(fixture_a)
        .unwrap()
        .add_collision_handler(move |_, _, _| {
            counter.set(counter.get() + 1);
            false
        });
    (sim, a, votes)
}

#[test]
fn all_must_agree_lets_one_handler_veto() {
    let (mut sim, a, votes) = vetoed_pair(VetoPolicy::AllMustAgree);
    sim.step(DT).unwrap();

    let (_, contact) = sim.contacts_of(a).next().unwrap();
    assert!(!contact.is_touching());
    assert_eq!(votes.get(), 1);
    // The global listener is only asked once every handler agreed.
    assert_eq!(sim.callbacks().begins, 0);

    // A vetoed pair is offered again on the next step, without a separation event.
    sim.step(DT).unwrap();
    assert_eq!(votes.get(), 2);
    assert_eq!(sim.callbacks().ends, 0);
}

#[test]
fn last_handler_wins_lets_listener_override() {
    let (mut sim, a, votes) = vetoed_pair(VetoPolicy::LastHandlerWins);
    sim.step(DT).unwrap();

    let (_, contact) = sim.contacts_of(a).next().unwrap();
    assert!(contact.is_touching());
    assert_eq!(votes.get(), 1);
    assert_eq!(sim.callbacks().begins, 1);

    sim.step(DT).unwrap();
    assert_eq!(votes.get(), 1);
    assert_eq!(sim.callbacks().begins, 1);
}

#[test]
fn separating_circles_report_end_once() {
    let listener = CountingListener {
        accept: true,
        ..Default::default()
    };
    let mut sim = Simulation::new(weightless(), listener).unwrap();
    let (a, _) = dynamic_circle(&mut sim, Vec2::ZERO, Vec2::ZERO);
    dynamic_circle(&mut sim, Vec2::new(1.9, 0.0), Vec2::ZERO);
    sim.step(DT).unwrap();
    assert_eq!(sim.callbacks().begins, 1);

    sim.body_mut(a)
        .unwrap()
        .set_transform(Vec2::new(-5.0, 0.0), 0.0);
    sim.step(DT).unwrap();
    sim.step(DT).unwrap();
    assert_eq!(sim.callbacks().ends, 1);
    assert_eq!(sim.contacts().len(), 0);
}

#[test]
fn resting_impulses_are_warm_started() {
    let mut sim = Simulation::new(SimulationSettings::default(), NoContactCallbacks).unwrap();
    let ground = sim.add_body(&BodyDescription::create_static(Vec2::new(0.0, -1.0)));
    sim.add_fixture(
        ground,
        FixtureDescription::new(PolygonShape::new_box(10.0, 1.0, 0.0).unwrap()),
    )
    .unwrap();
    let body = sim.add_body(&BodyDescription::create_dynamic(
        Vec2::new(0.0, 0.5),
        BodyVelocity::default(),
    ));
    sim.add_fixture(
        body,
        FixtureDescription::new(PolygonShape::new_box(0.5, 0.5, 1.0).unwrap()),
    )
    .unwrap();

    for _ in 0..180 {
        sim.step(DT).unwrap();
    }
    let impulses = |sim: &Simulation<NoContactCallbacks>| -> Vec<f32> {
        let (_, contact) = sim.contacts_of(body).next().unwrap();
        contact
            .manifold()
            .points()
            .iter()
            .map(|p| p.normal_impulse)
            .collect()
    };
    let before = impulses(&sim);
    assert_eq!(before.len(), 2);
    assert!(before.iter().all(|i| *i > 0.0));

    sim.step(DT).unwrap();
    let after = impulses(&sim);
    for (a, b) in before.iter().zip(&after) {
        assert!((a - b).abs() < 5e-3, "{a} -> {b}");
    }
}

#[test]
fn spatial_hash_register_remove_is_symmetric() {
    let mut hash = SpatialHash::<u32>::new(1.0).unwrap();
    hash.register(0, BoundingBox::new(Vec2::new(-3.2, -0.5), Vec2::new(0.4, 2.1)), 1);
    hash.register(1, BoundingBox::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)), 1);

    let snapshot = |hash: &SpatialHash<u32>| {
        let mut cells = Vec::new();
        for x in -6..6 {
            for y in -6..6 {
                let mut cell = hash.cell((x, y)).to_vec();
                cell.sort_unstable();
                cells.push(cell);
            }
        }
        (hash.cell_count(), hash.entry_count(), cells)
    };
    let before = snapshot(&hash);

    hash.register(7, BoundingBox::new(Vec2::new(-4.7, -1.3), Vec2::new(2.2, 0.9)), 1);
    assert!(hash.entry_count() > before.1);
    assert!(hash.remove(7));
    assert_eq!(snapshot(&hash), before);
    assert!(!hash.remove(7));
}

#[test]
fn looped_chain_links_its_ends() {
    let square = [
        Vec2::new(0.0, 0.0),
        Vec2::new(2.0, 0.0),
        Vec2::new(2.0, 2.0),
        Vec2::new(0.0, 2.0),
    ];
    let chain = ChainShape::new_loop(&square).unwrap();
    let count = chain.child_count();
    assert_eq!(count, 4);

    let first = chain.child_edge(0);
    assert!(first.has_vertex0);
    assert_eq!(first.vertex0, square[3]);

    let last = chain.child_edge(count - 1);
    assert!(last.has_vertex3);
    assert_eq!(last.vertex3, square[1]);
    assert_eq!(last.vertex2, square[0]);
}

#[test]
fn polygon_mass_is_winding_and_translation_consistent() {
    let ccw = [
        Vec2::new(-1.0, -0.5),
        Vec2::new(1.0, -0.5),
        Vec2::new(1.5, 0.5),
        Vec2::new(-1.0, 0.5),
    ];
    let mut cw = ccw;
    cw.reverse();
    let a = PolygonShape::new(&ccw, 2.0).unwrap();
    let b = PolygonShape::new(&cw, 2.0).unwrap();
    assert!((a.mass_data().mass - b.mass_data().mass).abs() < 1e-5);
    assert!((a.mass_data().inertia - b.mass_data().inertia).abs() < 1e-4);
    for (v, n) in b.vertices().iter().zip(b.normals()) {
        // Outward normals for counter-clockwise storage.
        assert!(n.dot(*v - b.centroid()) > 0.0);
    }

    let offset = Vec2::new(3.0, -2.0);
    let moved: Vec<Vec2> = ccw.iter().map(|v| *v + offset).collect();
    let c = PolygonShape::new(&moved, 2.0).unwrap();
    let (ma, mc) = (a.mass_data(), c.mass_data());
    assert!((mc.centroid - (ma.centroid + offset)).length() < 1e-4);
    // Parallel axis: I_origin = I_center + m * d^2.
    let center_a = ma.inertia - ma.mass * ma.centroid.length_squared();
    let center_c = mc.inertia - mc.mass * mc.centroid.length_squared();
    assert!((center_a - center_c).abs() < 1e-3 * center_a);
}

#[test]
fn circle_aabb_is_exact() {
    let mut sim = Simulation::new(weightless(), NoContactCallbacks).unwrap();
    let body = sim.add_body(&BodyDescription::create_static(Vec2::new(1.25, -3.5)));
    let fixture = sim
        .add_fixture(
            body,
            FixtureDescription::new(
                CircleShape::with_position(Vec2::new(0.5, 0.0), 0.75, 0.0).unwrap(),
            ),
        )
        .unwrap();
    let bounds = sim
        .broad_phase()
        .registered_bounds(rust_physics2d::FixtureProxy::new(fixture, 0))
        .unwrap();
    assert_eq!(bounds.min, Vec2::new(1.0, -4.25));
    assert_eq!(bounds.max, Vec2::new(2.5, -2.75));
}
