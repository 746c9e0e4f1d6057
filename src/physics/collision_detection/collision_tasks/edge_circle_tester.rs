use glam::Vec2;

use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::circle::CircleShape;
use crate::physics::collidables::edge::EdgeShape;
use crate::physics::collision_detection::contact_manifold::{
    ContactFeature, ContactFeatureType, Manifold, ManifoldPoint, ManifoldType,
};

/// Pair tester for edge vs circle collisions. The edge is always shape A.
///
/// The circle center is classified against the Voronoi regions of the segment: vertex A,
/// vertex B or the segment interior. Vertex regions defer to the neighboring segment when a
/// ghost vertex says the circle really belongs to it.
pub struct EdgeCircleTester;

impl EdgeCircleTester {
    pub fn test(
        manifold: &mut Manifold,
        edge_a: &EdgeShape,
        xf_a: &RigidPose,
        circle_b: &CircleShape,
        xf_b: &RigidPose,
    ) {
        manifold.point_count = 0;

        // Circle center in the frame of the edge.
        let q = xf_a.transform_by_inverse(xf_b.transform(circle_b.position()));

        let a = edge_a.vertex1;
        let b = edge_a.vertex2;
        let e = b - a;

        // Barycentric coordinates.
        let u = e.dot(b - q);
        let v = e.dot(q - a);

        let radius = edge_a.radius() + circle_b.radius();

        // Region A
        if v <= 0.0 {
            if q.distance_squared(a) > radius * radius {
                return;
            }

            // Is there an edge connected to A?
            if edge_a.has_vertex0 {
                let a1 = edge_a.vertex0;
                let b1 = a;
                let u1 = (b1 - a1).dot(b1 - q);

                // Is the circle in Region AB of the previous edge?
                if u1 > 0.0 {
                    return;
                }
            }

            Self::write_vertex_contact(manifold, a, 0, circle_b);
            return;
        }

        // Region B
        if u <= 0.0 {
            if q.distance_squared(b) > radius * radius {
                return;
            }

            // Is there an edge connected to B?
            if edge_a.has_vertex3 {
                let b2 = edge_a.vertex3;
                let a2 = b;
                let v2 = (b2 - a2).dot(q - a2);

                // Is the circle in Region AB of the next edge?
                if v2 > 0.0 {
                    return;
                }
            }

            Self::write_vertex_contact(manifold, b, 1, circle_b);
            return;
        }

        // Region AB
        let den = e.dot(e);
        debug_assert!(den > 0.0);
        let p = (1.0 / den) * (u * a + v * b);
        if q.distance_squared(p) > radius * radius {
            return;
        }

        let mut n = Vec2::new(-e.y, e.x);
        if n.dot(q - a) < 0.0 {
            n = -n;
        }

        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = n.normalize_or_zero();
        manifold.local_point = a;
        manifold.points[0] = ManifoldPoint {
            local_point: circle_b.position(),
            id: ContactFeature::new(0, 0, ContactFeatureType::Face, ContactFeatureType::Vertex),
            ..Default::default()
        };
        manifold.point_count = 1;
    }

    fn write_vertex_contact(
        manifold: &mut Manifold,
        vertex: Vec2,
        index: u8,
        circle_b: &CircleShape,
    ) {
        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = vertex;
        manifold.points[0] = ManifoldPoint {
            local_point: circle_b.position(),
            id: ContactFeature::new(
                index,
                0,
                ContactFeatureType::Vertex,
                ContactFeatureType::Vertex,
            ),
            ..Default::default()
        };
        manifold.point_count = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(edge: &EdgeShape, center: Vec2) -> Manifold {
        let circle = CircleShape::new(0.5, 1.0).unwrap();
        let mut manifold = Manifold::default();
        EdgeCircleTester::test(
            &mut manifold,
            edge,
            &RigidPose::IDENTITY,
            &circle,
            &RigidPose::from_position(center),
        );
        manifold
    }

    #[test]
    fn interior_contact_faces_the_circle() {
        let edge = EdgeShape::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let above = run(&edge, Vec2::new(0.3, 0.4));
        assert_eq!(above.manifold_type, ManifoldType::FaceA);
        assert!((above.local_normal - Vec2::Y).length() < 1e-6);
        let below = run(&edge, Vec2::new(0.3, -0.4));
        assert!((below.local_normal + Vec2::Y).length() < 1e-6);
    }

    #[test]
    fn end_regions_use_vertices() {
        let edge = EdgeShape::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let manifold = run(&edge, Vec2::new(1.3, 0.2));
        assert_eq!(manifold.manifold_type, ManifoldType::Circles);
        assert_eq!(manifold.local_point, Vec2::new(1.0, 0.0));
        assert_eq!(manifold.points[0].id.index_a, 1);
        assert_eq!(run(&edge, Vec2::new(2.0, 0.0)).point_count, 0);
    }

    #[test]
    fn ghost_vertex_hands_off_to_neighbor() {
        // Next segment continues to the right; the circle sits over it, so this edge yields.
        let mut edge = EdgeShape::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        edge.set_vertex3(Some(Vec2::new(3.0, 0.0)));
        assert_eq!(run(&edge, Vec2::new(1.3, 0.4)).point_count, 0);

        // A convex corner going down: the circle is not over the next segment.
        edge.set_vertex3(Some(Vec2::new(1.0, -2.0)));
        assert_eq!(run(&edge, Vec2::new(1.3, 0.2)).point_count, 1);
    }
}
