use glam::Vec2;

use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::polygon::PolygonShape;
use crate::physics::collision_detection::contact_manifold::{
    ClipVertex, ContactFeature, ContactFeatureType,
};

/// Sutherland-Hodgman clipping of a two-vertex segment against the half-space
/// `dot(normal, x) <= offset`. Returns the clipped vertices and how many of them are valid.
/// A vertex created on the clip plane takes `vertex_index_a` as its feature on shape A.
pub fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: usize,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut count = 0;

    // Distance of the end points to the line.
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // Points behind the plane survive.
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // The points are on different sides of the plane.
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        v_out[count] = ClipVertex {
            v: v_in[0].v + interp * (v_in[1].v - v_in[0].v),
            // VertexA is hitting edgeB.
            id: ContactFeature::new(
                vertex_index_a as u8,
                v_in[0].id.index_b,
                ContactFeatureType::Vertex,
                ContactFeatureType::Face,
            ),
        };
        count += 1;
    }

    (v_out, count)
}

/// Finds the face normal of `poly1` with the largest separation from `poly2`.
/// Returns the face index and the separation.
pub fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &RigidPose,
    poly2: &PolygonShape,
    xf2: &RigidPose,
) -> (usize, f32) {
    // Work in the frame of poly2.
    let xf = xf2.multiply_by_inverse(xf1);

    let mut best_index = 0;
    let mut max_separation = f32::MIN;
    for (i, (n1, v1)) in poly1.normals().iter().zip(poly1.vertices()).enumerate() {
        let n = xf.rotation.apply(*n1);
        let v1 = xf.transform(*v1);

        // Deepest point of poly2 along n.
        let si = poly2
            .vertices()
            .iter()
            .map(|v2| n.dot(*v2 - v1))
            .fold(f32::MAX, f32::min);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

/// Finds the edge of `poly2` most anti-parallel to face `edge1` of `poly1` and returns its
/// end points in world space.
pub fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &RigidPose,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &RigidPose,
) -> [ClipVertex; 2] {
    let normals2 = poly2.normals();
    let vertices2 = poly2.vertices();

    // Reference normal in the frame of poly2.
    let normal1 = xf2
        .rotation
        .apply_inverse(xf1.rotation.apply(poly1.normals()[edge1]));

    let mut index = 0;
    let mut min_dot = f32::MAX;
    for (i, n2) in normals2.iter().enumerate() {
        let dot = normal1.dot(*n2);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = if i1 + 1 < vertices2.len() { i1 + 1 } else { 0 };

    [
        ClipVertex {
            v: xf2.transform(vertices2[i1]),
            id: ContactFeature::new(
                edge1 as u8,
                i1 as u8,
                ContactFeatureType::Face,
                ContactFeatureType::Vertex,
            ),
        },
        ClipVertex {
            v: xf2.transform(vertices2[i2]),
            id: ContactFeature::new(
                edge1 as u8,
                i2 as u8,
                ContactFeatureType::Face,
                ContactFeatureType::Vertex,
            ),
        },
    ]
}
