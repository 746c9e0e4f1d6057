use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::circle::CircleShape;
use crate::physics::collidables::polygon::PolygonShape;
use crate::physics::collision_detection::contact_manifold::{
    ContactFeature, Manifold, ManifoldPoint, ManifoldType,
};
use crate::utilities::math_helper::EPSILON;

/// Pair tester for polygon vs circle collisions. The polygon is always shape A.
pub struct PolygonCircleTester;

impl PolygonCircleTester {
    pub fn test(
        manifold: &mut Manifold,
        polygon_a: &PolygonShape,
        xf_a: &RigidPose,
        circle_b: &CircleShape,
        xf_b: &RigidPose,
    ) {
        manifold.point_count = 0;

        // Circle center in the frame of the polygon.
        let c = xf_b.transform(circle_b.position());
        let c_local = xf_a.transform_by_inverse(c);

        let vertices = polygon_a.vertices();
        let normals = polygon_a.normals();
        let radius = polygon_a.radius() + circle_b.radius();

        // Find the min separating edge.
        let mut normal_index = 0;
        let mut separation = f32::MIN;
        for (i, (v, n)) in vertices.iter().zip(normals).enumerate() {
            let s = n.dot(c_local - *v);
            if s > radius {
                // Early out.
                return;
            }
            if s > separation {
                separation = s;
                normal_index = i;
            }
        }

        let vert_index1 = normal_index;
        let vert_index2 = (vert_index1 + 1) % vertices.len();
        let v1 = vertices[vert_index1];
        let v2 = vertices[vert_index2];

        manifold.manifold_type = ManifoldType::FaceA;
        manifold.points[0] = ManifoldPoint {
            local_point: circle_b.position(),
            id: ContactFeature::default(),
            ..Default::default()
        };

        // Center is inside the polygon.
        if separation < EPSILON {
            manifold.local_normal = normals[normal_index];
            manifold.local_point = 0.5 * (v1 + v2);
            manifold.point_count = 1;
            return;
        }

        // Compute barycentric coordinates.
        let u1 = (c_local - v1).dot(v2 - v1);
        let u2 = (c_local - v2).dot(v1 - v2);
        if u1 <= 0.0 {
            if c_local.distance_squared(v1) > radius * radius {
                return;
            }
            manifold.local_normal = (c_local - v1).normalize_or_zero();
            manifold.local_point = v1;
        } else if u2 <= 0.0 {
            if c_local.distance_squared(v2) > radius * radius {
                return;
            }
            manifold.local_normal = (c_local - v2).normalize_or_zero();
            manifold.local_point = v2;
        } else {
            let face_center = 0.5 * (v1 + v2);
            let s = (c_local - face_center).dot(normals[vert_index1]);
            if s > radius {
                return;
            }
            manifold.local_normal = normals[vert_index1];
            manifold.local_point = face_center;
        }
        manifold.point_count = 1;
    }
}
