use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::polygon::PolygonShape;
use crate::physics::collision_detection::contact_manifold::{
    Manifold, ManifoldPoint, ManifoldType,
};
use crate::physics::settings::LINEAR_SLOP;
use crate::utilities::math_helper::cross_vs;

use super::manifold_candidate_helper::{
    clip_segment_to_line, find_incident_edge, find_max_separation,
};

/// Pair tester for convex polygon collisions.
///
/// Finds the face of either polygon with maximum separation (the reference face), picks the
/// most anti-parallel edge of the other polygon (the incident edge), and clips the incident
/// edge against the side planes of the reference face.
pub struct PolygonPairTester;

impl PolygonPairTester {
    pub fn test(
        manifold: &mut Manifold,
        poly_a: &PolygonShape,
        xf_a: &RigidPose,
        poly_b: &PolygonShape,
        xf_b: &RigidPose,
    ) {
        manifold.point_count = 0;
        let total_radius = poly_a.radius() + poly_b.radius();

        let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
        if separation_a > total_radius {
            return;
        }

        let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
        if separation_b > total_radius {
            return;
        }

        // Prefer A's face unless B's is clearly better, so the reference face doesn't flicker.
        const K_TOL: f32 = 0.1 * LINEAR_SLOP;
        let (poly1, xf1, poly2, xf2, edge1, flip) = if separation_b > separation_a + K_TOL {
            manifold.manifold_type = ManifoldType::FaceB;
            (poly_b, xf_b, poly_a, xf_a, edge_b, true)
        } else {
            manifold.manifold_type = ManifoldType::FaceA;
            (poly_a, xf_a, poly_b, xf_b, edge_a, false)
        };

        let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

        let vertices1 = poly1.vertices();
        let iv1 = edge1;
        let iv2 = if edge1 + 1 < vertices1.len() { edge1 + 1 } else { 0 };

        let v11 = vertices1[iv1];
        let v12 = vertices1[iv2];

        let local_tangent = (v12 - v11).normalize_or_zero();
        let local_normal = cross_vs(local_tangent, 1.0);
        let plane_point = 0.5 * (v11 + v12);

        let tangent = xf1.rotation.apply(local_tangent);
        let normal = cross_vs(tangent, 1.0);

        let v11 = xf1.transform(v11);
        let v12 = xf1.transform(v12);

        // Face offset.
        let front_offset = normal.dot(v11);

        // Side offsets, extended by the polygon skin thickness.
        let side_offset1 = -tangent.dot(v11) + total_radius;
        let side_offset2 = tangent.dot(v12) + total_radius;

        // Clip incident edge against the extruded edge1 side edges.
        let (clip_points1, count) =
            clip_segment_to_line(&incident_edge, -tangent, side_offset1, iv1);
        if count < 2 {
            return;
        }
        let (clip_points2, count) =
            clip_segment_to_line(&clip_points1, tangent, side_offset2, iv2);
        if count < 2 {
            return;
        }

        // Now clip_points2 contains the clipped points.
        manifold.local_normal = local_normal;
        manifold.local_point = plane_point;

        let mut point_count = 0;
        for clip in &clip_points2 {
            let separation = normal.dot(clip.v) - front_offset;
            if separation <= total_radius {
                manifold.points[point_count] = ManifoldPoint {
                    local_point: xf2.transform_by_inverse(clip.v),
                    id: if flip { clip.id.flipped() } else { clip.id },
                    ..Default::default()
                };
                point_count += 1;
            }
        }
        manifold.point_count = point_count;
    }
}
