use glam::Vec2;

use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::circle::CircleShape;
use crate::physics::collision_detection::contact_manifold::{
    ContactFeature, Manifold, ManifoldPoint, ManifoldType,
};

/// Pair tester for circle vs circle collisions.
pub struct CirclePairTester;

impl CirclePairTester {
    /// Produces a single point when the circles are within the sum of their radii.
    /// The normal is resolved later from the two centers.
    #[inline(always)]
    pub fn test(
        manifold: &mut Manifold,
        circle_a: &CircleShape,
        xf_a: &RigidPose,
        circle_b: &CircleShape,
        xf_b: &RigidPose,
    ) {
        manifold.point_count = 0;

        let p_a = xf_a.transform(circle_a.position());
        let p_b = xf_b.transform(circle_b.position());
        let distance_squared = p_a.distance_squared(p_b);
        let radius = circle_a.radius() + circle_b.radius();
        if distance_squared > radius * radius {
            return;
        }

        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_point = circle_a.position();
        manifold.local_normal = Vec2::ZERO;
        manifold.points[0] = ManifoldPoint {
            local_point: circle_b.position(),
            id: ContactFeature::default(),
            ..Default::default()
        };
        manifold.point_count = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_circles_make_one_point() {
        let a = CircleShape::new(1.0, 1.0).unwrap();
        let b = CircleShape::with_position(Vec2::new(0.0, 0.25), 1.0, 1.0).unwrap();
        let mut manifold = Manifold::default();
        CirclePairTester::test(
            &mut manifold,
            &a,
            &RigidPose::IDENTITY,
            &b,
            &RigidPose::from_position(Vec2::new(1.5, 0.0)),
        );
        assert_eq!(manifold.point_count, 1);
        assert_eq!(manifold.manifold_type, ManifoldType::Circles);
        assert_eq!(manifold.points[0].local_point, Vec2::new(0.0, 0.25));
    }

    #[test]
    fn distant_circles_make_nothing() {
        let a = CircleShape::new(1.0, 1.0).unwrap();
        let mut manifold = Manifold::default();
        manifold.point_count = 2;
        CirclePairTester::test(
            &mut manifold,
            &a,
            &RigidPose::IDENTITY,
            &a,
            &RigidPose::from_position(Vec2::new(2.01, 0.0)),
        );
        assert_eq!(manifold.point_count, 0);
    }
}
