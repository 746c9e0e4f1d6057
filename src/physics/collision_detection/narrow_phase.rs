use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::shape::{Shape, ShapeType};

use super::collision_task_registry::{
    requires_swap, CollisionTaskRegistry, ContactType, NarrowPhaseScratch,
};
use super::contact_manifold::{Manifold, WorldManifold};

/// Computes contact manifolds for shape pairs by dispatching through a [`CollisionTaskRegistry`].
#[derive(Debug, Default)]
pub struct NarrowPhase {
    registry: CollisionTaskRegistry,
    scratch: NarrowPhaseScratch,
}

impl NarrowPhase {
    pub fn new(registry: CollisionTaskRegistry) -> Self {
        Self {
            registry,
            scratch: NarrowPhaseScratch::default(),
        }
    }

    #[inline(always)]
    pub fn registry(&self) -> &CollisionTaskRegistry {
        &self.registry
    }

    #[inline(always)]
    pub fn registry_mut(&mut self) -> &mut CollisionTaskRegistry {
        &mut self.registry
    }

    /// Gets the contact type of a pair, or [`ContactType::NotSupported`] if the registry has no
    /// routine for it.
    pub fn contact_type(&self, type_a: ShapeType, type_b: ShapeType) -> ContactType {
        if self.registry.supports(type_a, type_b) {
            ContactType::of(type_a, type_b)
        } else {
            ContactType::NotSupported
        }
    }

    /// Writes the manifold of a canonically ordered pair. Unsupported pairs produce an empty
    /// manifold.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &mut self,
        manifold: &mut Manifold,
        shape_a: &Shape,
        child_index_a: usize,
        xf_a: &RigidPose,
        shape_b: &Shape,
        child_index_b: usize,
        xf_b: &RigidPose,
    ) {
        debug_assert!(!requires_swap(shape_a.shape_type(), shape_b.shape_type()));
        match self.registry.get(shape_a.shape_type(), shape_b.shape_type()) {
            Some(task) => task(
                manifold,
                shape_a,
                child_index_a,
                xf_a,
                shape_b,
                child_index_b,
                xf_b,
                &mut self.scratch,
            ),
            None => manifold.point_count = 0,
        }
    }

    /// Tests whether two shape children touch, in either order. Polygon and edge skins count
    /// as part of the shape, so this matches what the contact solver would act on. Used for
    /// sensors.
    pub fn test_overlap(
        &mut self,
        shape_a: &Shape,
        child_index_a: usize,
        xf_a: &RigidPose,
        shape_b: &Shape,
        child_index_b: usize,
        xf_b: &RigidPose,
    ) -> bool {
        let mut manifold = Manifold::default();
        self.evaluate_unordered(
            &mut manifold,
            shape_a,
            child_index_a,
            xf_a,
            shape_b,
            child_index_b,
            xf_b,
        );
        manifold.point_count > 0
    }

    /// Tests whether the solid geometry of two shape children intersects. Polygon and edge
    /// skins are ignored; circles keep their radius. Used for world overlap queries.
    pub fn test_solid_overlap(
        &mut self,
        shape_a: &Shape,
        child_index_a: usize,
        xf_a: &RigidPose,
        shape_b: &Shape,
        child_index_b: usize,
        xf_b: &RigidPose,
    ) -> bool {
        // The skinned manifold is a superset of the solid contact, so its points carry every
        // candidate separation.
        let mut manifold = Manifold::default();
        let swapped = self.evaluate_unordered(
            &mut manifold,
            shape_a,
            child_index_a,
            xf_a,
            shape_b,
            child_index_b,
            xf_b,
        );
        if manifold.point_count == 0 {
            return false;
        }
        let (first, xf_first, second, xf_second) = if swapped {
            (shape_b, xf_b, shape_a, xf_a)
        } else {
            (shape_a, xf_a, shape_b, xf_b)
        };
        let world = WorldManifold::initialize(
            &manifold,
            xf_first,
            solid_radius(first),
            xf_second,
            solid_radius(second),
        );
        world.separations[..manifold.point_count]
            .iter()
            .any(|separation| *separation <= 0.0)
    }

    /// Evaluates a pair in canonical order. Returns true if the shapes were swapped.
    #[allow(clippy::too_many_arguments)]
    fn evaluate_unordered(
        &mut self,
        manifold: &mut Manifold,
        shape_a: &Shape,
        child_index_a: usize,
        xf_a: &RigidPose,
        shape_b: &Shape,
        child_index_b: usize,
        xf_b: &RigidPose,
    ) -> bool {
        if requires_swap(shape_a.shape_type(), shape_b.shape_type()) {
            self.evaluate(manifold, shape_b, child_index_b, xf_b, shape_a, child_index_a, xf_a);
            true
        } else {
            self.evaluate(manifold, shape_a, child_index_a, xf_a, shape_b, child_index_b, xf_b);
            false
        }
    }
}

/// Radius that belongs to the solid shape rather than its collision skin.
fn solid_radius(shape: &Shape) -> f32 {
    match shape {
        Shape::Circle(circle) => circle.radius(),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::chain::ChainShape;
    use crate::physics::collidables::circle::CircleShape;
    use crate::physics::collidables::edge::EdgeShape;
    use crate::physics::collidables::polygon::PolygonShape;
    use glam::Vec2;

    #[test]
    fn overlap_is_symmetric() {
        let mut narrow_phase = NarrowPhase::default();
        let circle: Shape = CircleShape::new(0.5, 1.0).unwrap().into();
        let square: Shape = PolygonShape::new_box(0.5, 0.5, 1.0).unwrap().into();
        let near = RigidPose::from_position(Vec2::new(0.9, 0.0));
        let far = RigidPose::from_position(Vec2::new(1.2, 0.0));
        for xf in [near, far] {
            let forward =
                narrow_phase.test_overlap(&square, 0, &RigidPose::IDENTITY, &circle, 0, &xf);
            let backward =
                narrow_phase.test_overlap(&circle, 0, &xf, &square, 0, &RigidPose::IDENTITY);
            assert_eq!(forward, backward);
        }
        assert!(narrow_phase.test_overlap(&square, 0, &RigidPose::IDENTITY, &circle, 0, &near));
        assert!(!narrow_phase.test_overlap(&square, 0, &RigidPose::IDENTITY, &circle, 0, &far));
    }

    #[test]
    fn chain_children_collide_through_scratch_edge() {
        let mut narrow_phase = NarrowPhase::default();
        let chain: Shape = ChainShape::new_chain(&[
            Vec2::new(-4.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
        ])
        .unwrap()
        .into();
        let circle: Shape = CircleShape::new(0.5, 1.0).unwrap().into();
        let xf = RigidPose::from_position(Vec2::new(2.0, 0.4));
        let mut manifold = Manifold::default();
        narrow_phase.evaluate(&mut manifold, &chain, 1, &RigidPose::IDENTITY, &circle, 0, &xf);
        assert_eq!(manifold.point_count, 1);
        narrow_phase.evaluate(&mut manifold, &chain, 0, &RigidPose::IDENTITY, &circle, 0, &xf);
        assert_eq!(manifold.point_count, 0);
    }

    #[test]
    fn edge_pairs_are_unsupported() {
        let mut narrow_phase = NarrowPhase::default();
        let edge: Shape = EdgeShape::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)).into();
        assert_eq!(
            narrow_phase.contact_type(ShapeType::Edge, ShapeType::Edge),
            ContactType::NotSupported
        );
        assert!(!narrow_phase.test_overlap(
            &edge,
            0,
            &RigidPose::IDENTITY,
            &edge,
            0,
            &RigidPose::IDENTITY
        ));
    }
}
