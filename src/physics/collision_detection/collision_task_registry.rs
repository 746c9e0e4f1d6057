use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::edge::EdgeShape;
use crate::physics::collidables::shape::{Shape, ShapeType};

use super::collision_tasks::circle_pair_tester::CirclePairTester;
use super::collision_tasks::edge_circle_tester::EdgeCircleTester;
use super::collision_tasks::edge_polygon_tester::EdgePolygonTester;
use super::collision_tasks::polygon_circle_tester::PolygonCircleTester;
use super::collision_tasks::polygon_pair_tester::PolygonPairTester;
use super::contact_manifold::Manifold;

/// Narrow phase routine for a shape type pair. Shapes arrive in the order the registry expects.
pub type CollisionTask = fn(
    manifold: &mut Manifold,
    shape_a: &Shape,
    child_index_a: usize,
    xf_a: &RigidPose,
    shape_b: &Shape,
    child_index_b: usize,
    xf_b: &RigidPose,
    scratch: &mut NarrowPhaseScratch,
);

/// Reusable working memory for narrow phase routines. Owned by whoever drives the narrow
/// phase and passed down explicitly.
#[derive(Debug, Clone, Default)]
pub struct NarrowPhaseScratch {
    /// Chain children are expanded into this edge before testing.
    pub edge: EdgeShape,
}

/// Kind of contact, one per supported shape type pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ContactType {
    NotSupported,
    Circle,
    PolygonAndCircle,
    Polygon,
    EdgeAndCircle,
    EdgeAndPolygon,
    ChainAndCircle,
    ChainAndPolygon,
}

impl fmt::Display for ContactType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Contact type of every shape type pair, indexed by `[type_a][type_b]`. Symmetric.
const CONTACT_TYPES: [[ContactType; ShapeType::COUNT]; ShapeType::COUNT] = {
    use ContactType::*;
    [
        // Circle
        [Circle, EdgeAndCircle, PolygonAndCircle, ChainAndCircle],
        // Edge
        [EdgeAndCircle, NotSupported, EdgeAndPolygon, NotSupported],
        // Polygon
        [PolygonAndCircle, EdgeAndPolygon, Polygon, ChainAndPolygon],
        // Chain
        [ChainAndCircle, NotSupported, ChainAndPolygon, NotSupported],
    ]
};

impl ContactType {
    #[inline(always)]
    pub fn of(type_a: ShapeType, type_b: ShapeType) -> ContactType {
        CONTACT_TYPES[type_a.index()][type_b.index()]
    }
}

/// Returns true when a pair given as `(type_a, type_b)` must be swapped before it reaches the
/// narrow phase. The larger type value goes first, except that an edge always precedes a
/// polygon.
#[inline(always)]
pub fn requires_swap(type_a: ShapeType, type_b: ShapeType) -> bool {
    let keep = (type_a >= type_b || (type_a == ShapeType::Edge && type_b == ShapeType::Polygon))
        && !(type_b == ShapeType::Edge && type_a == ShapeType::Polygon);
    !keep
}

/// Table of narrow phase routines indexed by canonically ordered shape type pair.
pub struct CollisionTaskRegistry {
    tasks: [[Option<CollisionTask>; ShapeType::COUNT]; ShapeType::COUNT],
}

impl fmt::Debug for CollisionTaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let registered = self.tasks.iter().flatten().filter(|t| t.is_some()).count();
        f.debug_struct("CollisionTaskRegistry")
            .field("registered", &registered)
            .finish()
    }
}

impl Default for CollisionTaskRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ShapeType::Circle, ShapeType::Circle, collide_circles);
        registry.register(ShapeType::Polygon, ShapeType::Circle, collide_polygon_and_circle);
        registry.register(ShapeType::Polygon, ShapeType::Polygon, collide_polygons);
        registry.register(ShapeType::Edge, ShapeType::Circle, collide_edge_and_circle);
        registry.register(ShapeType::Edge, ShapeType::Polygon, collide_edge_and_polygon);
        registry.register(ShapeType::Chain, ShapeType::Circle, collide_chain_and_circle);
        registry.register(ShapeType::Chain, ShapeType::Polygon, collide_chain_and_polygon);
        registry
    }
}

impl CollisionTaskRegistry {
    /// Creates a registry with no routines.
    pub fn empty() -> Self {
        Self {
            tasks: [[None; ShapeType::COUNT]; ShapeType::COUNT],
        }
    }

    /// Registers the routine for a pair. `type_a` must be the type that comes first after
    /// canonical ordering.
    pub fn register(&mut self, type_a: ShapeType, type_b: ShapeType, task: CollisionTask) {
        debug_assert!(
            !requires_swap(type_a, type_b),
            "{type_a}/{type_b} is not in canonical order"
        );
        self.tasks[type_a.index()][type_b.index()] = Some(task);
    }

    /// Gets the routine for a canonically ordered pair.
    #[inline(always)]
    pub fn get(&self, type_a: ShapeType, type_b: ShapeType) -> Option<CollisionTask> {
        self.tasks[type_a.index()][type_b.index()]
    }

    /// Gets whether a pair can produce contacts in either order.
    #[inline(always)]
    pub fn supports(&self, type_a: ShapeType, type_b: ShapeType) -> bool {
        if requires_swap(type_a, type_b) {
            self.get(type_b, type_a).is_some()
        } else {
            self.get(type_a, type_b).is_some()
        }
    }
}

fn collide_circles(
    manifold: &mut Manifold,
    shape_a: &Shape,
    _child_index_a: usize,
    xf_a: &RigidPose,
    shape_b: &Shape,
    _child_index_b: usize,
    xf_b: &RigidPose,
    _scratch: &mut NarrowPhaseScratch,
) {
    if let (Shape::Circle(a), Shape::Circle(b)) = (shape_a, shape_b) {
        CirclePairTester::test(manifold, a, xf_a, b, xf_b);
    } else {
        manifold.point_count = 0;
    }
}

fn collide_polygon_and_circle(
    manifold: &mut Manifold,
    shape_a: &Shape,
    _child_index_a: usize,
    xf_a: &RigidPose,
    shape_b: &Shape,
    _child_index_b: usize,
    xf_b: &RigidPose,
    _scratch: &mut NarrowPhaseScratch,
) {
    if let (Shape::Polygon(a), Shape::Circle(b)) = (shape_a, shape_b) {
        PolygonCircleTester::test(manifold, a, xf_a, b, xf_b);
    } else {
        manifold.point_count = 0;
    }
}

fn collide_polygons(
    manifold: &mut Manifold,
    shape_a: &Shape,
    _child_index_a: usize,
    xf_a: &RigidPose,
    shape_b: &Shape,
    _child_index_b: usize,
    xf_b: &RigidPose,
    _scratch: &mut NarrowPhaseScratch,
) {
    if let (Shape::Polygon(a), Shape::Polygon(b)) = (shape_a, shape_b) {
        PolygonPairTester::test(manifold, a, xf_a, b, xf_b);
    } else {
        manifold.point_count = 0;
    }
}

fn collide_edge_and_circle(
    manifold: &mut Manifold,
    shape_a: &Shape,
    _child_index_a: usize,
    xf_a: &RigidPose,
    shape_b: &Shape,
    _child_index_b: usize,
    xf_b: &RigidPose,
    _scratch: &mut NarrowPhaseScratch,
) {
    if let (Shape::Edge(a), Shape::Circle(b)) = (shape_a, shape_b) {
        EdgeCircleTester::test(manifold, a, xf_a, b, xf_b);
    } else {
        manifold.point_count = 0;
    }
}

fn collide_edge_and_polygon(
    manifold: &mut Manifold,
    shape_a: &Shape,
    _child_index_a: usize,
    xf_a: &RigidPose,
    shape_b: &Shape,
    _child_index_b: usize,
    xf_b: &RigidPose,
    _scratch: &mut NarrowPhaseScratch,
) {
    if let (Shape::Edge(a), Shape::Polygon(b)) = (shape_a, shape_b) {
        EdgePolygonTester::test(manifold, a, xf_a, b, xf_b);
    } else {
        manifold.point_count = 0;
    }
}

fn collide_chain_and_circle(
    manifold: &mut Manifold,
    shape_a: &Shape,
    child_index_a: usize,
    xf_a: &RigidPose,
    shape_b: &Shape,
    _child_index_b: usize,
    xf_b: &RigidPose,
    scratch: &mut NarrowPhaseScratch,
) {
    if let (Shape::Chain(a), Shape::Circle(b)) = (shape_a, shape_b) {
        a.get_child_edge(child_index_a, &mut scratch.edge);
        EdgeCircleTester::test(manifold, &scratch.edge, xf_a, b, xf_b);
    } else {
        manifold.point_count = 0;
    }
}

fn collide_chain_and_polygon(
    manifold: &mut Manifold,
    shape_a: &Shape,
    child_index_a: usize,
    xf_a: &RigidPose,
    shape_b: &Shape,
    _child_index_b: usize,
    xf_b: &RigidPose,
    scratch: &mut NarrowPhaseScratch,
) {
    if let (Shape::Chain(a), Shape::Polygon(b)) = (shape_a, shape_b) {
        a.get_child_edge(child_index_a, &mut scratch.edge);
        EdgePolygonTester::test(manifold, &scratch.edge, xf_a, b, xf_b);
    } else {
        manifold.point_count = 0;
    }
}
