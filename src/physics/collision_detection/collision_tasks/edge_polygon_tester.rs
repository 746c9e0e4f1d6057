use glam::Vec2;

use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::edge::EdgeShape;
use crate::physics::collidables::polygon::PolygonShape;
use crate::physics::collision_detection::contact_manifold::{
    ClipVertex, ContactFeature, ContactFeatureType, Manifold, ManifoldPoint, ManifoldType,
};
use crate::physics::settings::{ANGULAR_SLOP, MAX_MANIFOLD_POINTS, MAX_POLYGON_VERTICES};
use crate::utilities::math_helper::cross;

use super::manifold_candidate_helper::clip_segment_to_line;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisType {
    Unknown,
    EdgeA,
    EdgeB,
}

#[derive(Debug, Clone, Copy)]
struct SeparationAxis {
    axis_type: AxisType,
    index: usize,
    separation: f32,
}

/// Polygon B expressed in the frame of edge A.
struct TempPolygon {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
}

/// Reference face used for clipping.
struct ReferenceFace {
    i1: usize,
    i2: usize,
    v1: Vec2,
    v2: Vec2,
    normal: Vec2,
    side_normal1: Vec2,
    side_offset1: f32,
    side_normal2: Vec2,
    side_offset2: f32,
}

/// Pair tester for edge vs polygon collisions. The edge is always shape A.
///
/// The edge's ghost vertices decide which side of the edge is solid and bound the range of
/// polygon normals that may be used as a separating axis. That keeps a polygon sliding along
/// a chain from catching on the shared vertex between two segments.
pub struct EdgePolygonTester {
    polygon_b: TempPolygon,
    xf: RigidPose,
    centroid_b: Vec2,
    v1: Vec2,
    v2: Vec2,
    normal: Vec2,
    lower_limit: Vec2,
    upper_limit: Vec2,
    radius: f32,
    front: bool,
}

impl EdgePolygonTester {
    pub fn test(
        manifold: &mut Manifold,
        edge_a: &EdgeShape,
        xf_a: &RigidPose,
        polygon_b: &PolygonShape,
        xf_b: &RigidPose,
    ) {
        manifold.point_count = 0;
        let xf = xf_a.multiply_by_inverse(xf_b);
        let mut tester = Self {
            polygon_b: TempPolygon {
                vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
                normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
                count: polygon_b.vertices().len(),
            },
            xf,
            centroid_b: xf.transform(polygon_b.centroid()),
            v1: edge_a.vertex1,
            v2: edge_a.vertex2,
            normal: Vec2::ZERO,
            lower_limit: Vec2::ZERO,
            upper_limit: Vec2::ZERO,
            radius: polygon_b.radius() + edge_a.radius(),
            front: false,
        };
        tester.compute_limits(edge_a);
        tester.collide(manifold, polygon_b);
    }

    /// Picks the solid side of the edge and the admissible normal range from the edge's
    /// convexity with its neighbors.
    fn compute_limits(&mut self, edge_a: &EdgeShape) {
        let v0 = edge_a.vertex0;
        let v1 = edge_a.vertex1;
        let v2 = edge_a.vertex2;
        let v3 = edge_a.vertex3;
        let has_vertex0 = edge_a.has_vertex0;
        let has_vertex3 = edge_a.has_vertex3;

        let edge1 = (v2 - v1).normalize_or_zero();
        let normal1 = Vec2::new(edge1.y, -edge1.x);
        let offset1 = normal1.dot(self.centroid_b - v1);

        let mut normal0 = Vec2::ZERO;
        let mut normal2 = Vec2::ZERO;
        let mut offset0 = 0.0;
        let mut offset2 = 0.0;
        let mut convex1 = false;
        let mut convex2 = false;

        // Is there a preceding edge?
        if has_vertex0 {
            let edge0 = (v1 - v0).normalize_or_zero();
            normal0 = Vec2::new(edge0.y, -edge0.x);
            convex1 = cross(edge0, edge1) >= 0.0;
            offset0 = normal0.dot(self.centroid_b - v0);
        }

        // Is there a following edge?
        if has_vertex3 {
            let edge2 = (v3 - v2).normalize_or_zero();
            normal2 = Vec2::new(edge2.y, -edge2.x);
            convex2 = cross(edge1, edge2) > 0.0;
            offset2 = normal2.dot(self.centroid_b - v2);
        }

        // (front, lower and upper limits on the front side, lower and upper limits on the back side)
        let (front, lower_front, upper_front, lower_back, upper_back) =
            match (has_vertex0, has_vertex3) {
                (true, true) => match (convex1, convex2) {
                    (true, true) => (
                        offset0 >= 0.0 || offset1 >= 0.0 || offset2 >= 0.0,
                        normal0,
                        normal2,
                        -normal1,
                        -normal1,
                    ),
                    (true, false) => (
                        offset0 >= 0.0 || (offset1 >= 0.0 && offset2 >= 0.0),
                        normal0,
                        normal1,
                        -normal2,
                        -normal1,
                    ),
                    (false, true) => (
                        offset2 >= 0.0 || (offset0 >= 0.0 && offset1 >= 0.0),
                        normal1,
                        normal2,
                        -normal1,
                        -normal0,
                    ),
                    (false, false) => (
                        offset0 >= 0.0 && offset1 >= 0.0 && offset2 >= 0.0,
                        normal1,
                        normal1,
                        -normal2,
                        -normal0,
                    ),
                },
                (true, false) => {
                    if convex1 {
                        (
                            offset0 >= 0.0 || offset1 >= 0.0,
                            normal0,
                            -normal1,
                            normal1,
                            -normal1,
                        )
                    } else {
                        (
                            offset0 >= 0.0 && offset1 >= 0.0,
                            normal1,
                            -normal1,
                            normal1,
                            -normal0,
                        )
                    }
                }
                (false, true) => {
                    if convex2 {
                        (
                            offset1 >= 0.0 || offset2 >= 0.0,
                            -normal1,
                            normal2,
                            -normal1,
                            normal1,
                        )
                    } else {
                        (
                            offset1 >= 0.0 && offset2 >= 0.0,
                            -normal1,
                            normal1,
                            -normal2,
                            normal1,
                        )
                    }
                }
                (false, false) => (offset1 >= 0.0, -normal1, -normal1, normal1, normal1),
            };

        self.front = front;
        if front {
            self.normal = normal1;
            self.lower_limit = lower_front;
            self.upper_limit = upper_front;
        } else {
            self.normal = -normal1;
            self.lower_limit = lower_back;
            self.upper_limit = upper_back;
        }
    }

    fn collide(&mut self, manifold: &mut Manifold, polygon_b: &PolygonShape) {
        // Polygon B in the frame of A.
        for (i, (v, n)) in polygon_b
            .vertices()
            .iter()
            .zip(polygon_b.normals())
            .enumerate()
        {
            self.polygon_b.vertices[i] = self.xf.transform(*v);
            self.polygon_b.normals[i] = self.xf.rotation.apply(*n);
        }

        let edge_axis = self.compute_edge_separation();

        // If no valid normal can be found then this edge should not collide.
        if edge_axis.axis_type == AxisType::Unknown || edge_axis.separation > self.radius {
            return;
        }

        let polygon_axis = self.compute_polygon_separation();
        if polygon_axis.axis_type != AxisType::Unknown && polygon_axis.separation > self.radius {
            return;
        }

        // Use hysteresis for jitter reduction.
        const RELATIVE_TOL: f32 = 0.98;
        const ABSOLUTE_TOL: f32 = 0.001;

        let primary_axis = if polygon_axis.axis_type == AxisType::Unknown {
            edge_axis
        } else if polygon_axis.separation > RELATIVE_TOL * edge_axis.separation + ABSOLUTE_TOL {
            polygon_axis
        } else {
            edge_axis
        };

        let count = self.polygon_b.count;
        let (incident_edge, reference_face) = if primary_axis.axis_type == AxisType::EdgeA {
            manifold.manifold_type = ManifoldType::FaceA;

            // Search for the polygon normal that is most anti-parallel to the edge normal.
            let mut best_index = 0;
            let mut best_value = self.normal.dot(self.polygon_b.normals[0]);
            for i in 1..count {
                let value = self.normal.dot(self.polygon_b.normals[i]);
                if value < best_value {
                    best_value = value;
                    best_index = i;
                }
            }

            let i1 = best_index;
            let i2 = if i1 + 1 < count { i1 + 1 } else { 0 };

            let incident = [
                ClipVertex {
                    v: self.polygon_b.vertices[i1],
                    id: ContactFeature::new(
                        0,
                        i1 as u8,
                        ContactFeatureType::Face,
                        ContactFeatureType::Vertex,
                    ),
                },
                ClipVertex {
                    v: self.polygon_b.vertices[i2],
                    id: ContactFeature::new(
                        0,
                        i2 as u8,
                        ContactFeatureType::Face,
                        ContactFeatureType::Vertex,
                    ),
                },
            ];

            let face = if self.front {
                Self::reference_face(0, 1, self.v1, self.v2, self.normal)
            } else {
                Self::reference_face(1, 0, self.v2, self.v1, self.normal)
            };
            (incident, face)
        } else {
            manifold.manifold_type = ManifoldType::FaceB;

            let index_b = primary_axis.index as u8;
            let incident = [
                ClipVertex {
                    v: self.v1,
                    id: ContactFeature::new(
                        0,
                        index_b,
                        ContactFeatureType::Vertex,
                        ContactFeatureType::Face,
                    ),
                },
                ClipVertex {
                    v: self.v2,
                    id: ContactFeature::new(
                        0,
                        index_b,
                        ContactFeatureType::Vertex,
                        ContactFeatureType::Face,
                    ),
                },
            ];

            let i1 = primary_axis.index;
            let i2 = if i1 + 1 < count { i1 + 1 } else { 0 };
            let face = Self::reference_face(
                i1,
                i2,
                self.polygon_b.vertices[i1],
                self.polygon_b.vertices[i2],
                self.polygon_b.normals[i1],
            );
            (incident, face)
        };

        // Clip incident edge against extruded edge1 side edges.
        let (clip_points1, np) = clip_segment_to_line(
            &incident_edge,
            reference_face.side_normal1,
            reference_face.side_offset1,
            reference_face.i1,
        );
        if np < MAX_MANIFOLD_POINTS {
            return;
        }
        let (clip_points2, np) = clip_segment_to_line(
            &clip_points1,
            reference_face.side_normal2,
            reference_face.side_offset2,
            reference_face.i2,
        );
        if np < MAX_MANIFOLD_POINTS {
            return;
        }

        // Now clip_points2 contains the clipped points.
        if primary_axis.axis_type == AxisType::EdgeA {
            manifold.local_normal = reference_face.normal;
            manifold.local_point = reference_face.v1;
        } else {
            manifold.local_normal = polygon_b.normals()[reference_face.i1];
            manifold.local_point = polygon_b.vertices()[reference_face.i1];
        }

        let mut point_count = 0;
        for clip in &clip_points2 {
            let separation = reference_face.normal.dot(clip.v - reference_face.v1);
            if separation <= self.radius {
                manifold.points[point_count] = if primary_axis.axis_type == AxisType::EdgeA {
                    ManifoldPoint {
                        local_point: self.xf.transform_by_inverse(clip.v),
                        id: clip.id,
                        ..Default::default()
                    }
                } else {
                    ManifoldPoint {
                        local_point: clip.v,
                        id: clip.id.flipped(),
                        ..Default::default()
                    }
                };
                point_count += 1;
            }
        }
        manifold.point_count = point_count;
    }

    fn reference_face(i1: usize, i2: usize, v1: Vec2, v2: Vec2, normal: Vec2) -> ReferenceFace {
        let side_normal1 = Vec2::new(normal.y, -normal.x);
        let side_normal2 = -side_normal1;
        ReferenceFace {
            i1,
            i2,
            v1,
            v2,
            normal,
            side_normal1,
            side_offset1: side_normal1.dot(v1),
            side_normal2,
            side_offset2: side_normal2.dot(v2),
        }
    }

    fn compute_edge_separation(&self) -> SeparationAxis {
        let separation = self.polygon_b.vertices[..self.polygon_b.count]
            .iter()
            .map(|v| self.normal.dot(*v - self.v1))
            .fold(f32::MAX, f32::min);
        SeparationAxis {
            axis_type: AxisType::EdgeA,
            index: if self.front { 0 } else { 1 },
            separation,
        }
    }

    fn compute_polygon_separation(&self) -> SeparationAxis {
        let mut axis = SeparationAxis {
            axis_type: AxisType::Unknown,
            index: 0,
            separation: f32::MIN,
        };

        let perp = Vec2::new(-self.normal.y, self.normal.x);

        for i in 0..self.polygon_b.count {
            let n = -self.polygon_b.normals[i];

            let s1 = n.dot(self.polygon_b.vertices[i] - self.v1);
            let s2 = n.dot(self.polygon_b.vertices[i] - self.v2);
            let s = s1.min(s2);

            if s > self.radius {
                // No collision.
                return SeparationAxis {
                    axis_type: AxisType::EdgeB,
                    index: i,
                    separation: s,
                };
            }

            // Adjacency
            if n.dot(perp) >= 0.0 {
                if (n - self.upper_limit).dot(self.normal) < -ANGULAR_SLOP {
                    continue;
                }
            } else if (n - self.lower_limit).dot(self.normal) < -ANGULAR_SLOP {
                continue;
            }

            if s > axis.separation {
                axis = SeparationAxis {
                    axis_type: AxisType::EdgeB,
                    index: i,
                    separation: s,
                };
            }
        }
        axis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision_detection::contact_manifold::WorldManifold;

    fn ground() -> EdgeShape {
        EdgeShape::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0))
    }

    #[test]
    fn box_resting_on_edge() {
        let square = PolygonShape::new_box(0.5, 0.5, 1.0).unwrap();
        let xf_b = RigidPose::from_position(Vec2::new(0.0, 0.49));
        let mut manifold = Manifold::default();
        EdgePolygonTester::test(&mut manifold, &ground(), &RigidPose::IDENTITY, &square, &xf_b);

        assert_eq!(manifold.point_count, 2);
        assert_eq!(manifold.manifold_type, ManifoldType::FaceA);
        let world = WorldManifold::initialize(
            &manifold,
            &RigidPose::IDENTITY,
            ground().radius(),
            &xf_b,
            square.radius(),
        );
        assert!((world.normal - Vec2::Y).length() < 1e-5);
        for separation in &world.separations[..2] {
            assert!(*separation < 0.0);
        }
    }

    #[test]
    fn box_below_two_sided_edge() {
        let square = PolygonShape::new_box(0.5, 0.5, 1.0).unwrap();
        let xf_b = RigidPose::from_position(Vec2::new(0.0, -0.49));
        let mut manifold = Manifold::default();
        EdgePolygonTester::test(&mut manifold, &ground(), &RigidPose::IDENTITY, &square, &xf_b);
        assert_eq!(manifold.point_count, 2);
        let world = WorldManifold::initialize(
            &manifold,
            &RigidPose::IDENTITY,
            ground().radius(),
            &xf_b,
            square.radius(),
        );
        assert!((world.normal + Vec2::Y).length() < 1e-5);
    }

    #[test]
    fn separated_box_makes_nothing() {
        let square = PolygonShape::new_box(0.5, 0.5, 1.0).unwrap();
        let mut manifold = Manifold::default();
        EdgePolygonTester::test(
            &mut manifold,
            &ground(),
            &RigidPose::IDENTITY,
            &square,
            &RigidPose::from_position(Vec2::new(0.0, 1.0)),
        );
        assert_eq!(manifold.point_count, 0);
    }

    #[test]
    fn flat_joint_keeps_the_edge_normal() {
        // Box straddling the joint between two collinear segments.
        let mut edge = EdgeShape::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0));
        edge.set_vertex0(Some(Vec2::new(-2.0, 0.0)));
        edge.set_vertex3(Some(Vec2::new(4.0, 0.0)));
        let square = PolygonShape::new_box(0.5, 0.5, 1.0).unwrap();
        let xf_b = RigidPose::from_position(Vec2::new(0.1, 0.49));
        let mut manifold = Manifold::default();
        EdgePolygonTester::test(&mut manifold, &edge, &RigidPose::IDENTITY, &square, &xf_b);
        assert!(manifold.point_count >= 1);
        let world = WorldManifold::initialize(
            &manifold,
            &RigidPose::IDENTITY,
            edge.radius(),
            &xf_b,
            square.radius(),
        );
        assert!((world.normal - Vec2::Y).length() < 1e-4);
    }

    /// Edge from (0, 0) to (2, 0) with ghost neighbors.
    fn joint_edge(vertex0: Vec2, vertex3: Vec2) -> EdgeShape {
        let mut edge = EdgeShape::new(Vec2::ZERO, Vec2::new(2.0, 0.0));
        edge.set_vertex0(Some(vertex0));
        edge.set_vertex3(Some(vertex3));
        edge
    }

    fn collide_unit_box(edge: &EdgeShape, center: Vec2) -> (Manifold, WorldManifold) {
        let square = PolygonShape::new_box(0.5, 0.5, 1.0).unwrap();
        let xf_b = RigidPose::from_position(center);
        let mut manifold = Manifold::default();
        EdgePolygonTester::test(&mut manifold, edge, &RigidPose::IDENTITY, &square, &xf_b);
        let world = WorldManifold::initialize(
            &manifold,
            &RigidPose::IDENTITY,
            edge.radius(),
            &xf_b,
            square.radius(),
        );
        (manifold, world)
    }

    fn right_normal(from: Vec2, to: Vec2) -> Vec2 {
        let d = (to - from).normalize();
        Vec2::new(d.y, -d.x)
    }

    fn assert_within(normal: Vec2, lower: Vec2, upper: Vec2) {
        assert!(cross(lower, normal) >= -1e-5, "{normal} below {lower}");
        assert!(cross(normal, upper) >= -1e-5, "{normal} above {upper}");
    }

    fn assert_on_edge(manifold: &Manifold, world: &WorldManifold) {
        for point in &world.points[..manifold.point_count] {
            assert!(point.x >= -1e-4 && point.x <= 2.0 + 1e-4, "{point}");
        }
    }

    // In the three cases below the box overhangs the end of the edge by 0.005 while sinking
    // 0.01 into it, so its inner side face is shallower than its bottom face. Only the
    // normal limits keep that side face from becoming the contact normal.

    #[test]
    fn box_past_convex_joint_keeps_the_edge_normal() {
        let vertex3 = Vec2::new(4.0, 0.05);
        let edge = joint_edge(Vec2::new(-2.0, 0.0), vertex3);
        let (manifold, world) = collide_unit_box(&edge, Vec2::new(2.495, -0.49));

        assert_eq!(manifold.manifold_type, ManifoldType::FaceA);
        assert_eq!(manifold.point_count, 2);
        assert!((world.normal + Vec2::Y).length() < 1e-4);
        let normal0 = right_normal(Vec2::new(-2.0, 0.0), Vec2::ZERO);
        let normal2 = right_normal(Vec2::new(2.0, 0.0), vertex3);
        assert_within(world.normal, normal0, normal2);
        assert_on_edge(&manifold, &world);
    }

    #[test]
    fn box_past_concave_joint_keeps_the_edge_normal() {
        let edge = joint_edge(Vec2::new(-2.0, 0.0), Vec2::new(4.0, -0.05));
        let (manifold, world) = collide_unit_box(&edge, Vec2::new(2.495, -0.49));

        assert_eq!(manifold.manifold_type, ManifoldType::FaceA);
        assert_eq!(manifold.point_count, 2);
        assert!((world.normal + Vec2::Y).length() < 1e-4);
        assert!(world.normal.x.abs() < 1e-4);
        assert_on_edge(&manifold, &world);
    }

    #[test]
    fn box_on_back_side_past_bent_start_keeps_the_edge_normal() {
        let vertex0 = Vec2::new(-2.0, -0.05);
        let vertex3 = Vec2::new(4.0, 0.0);
        let edge = joint_edge(vertex0, vertex3);
        let (manifold, world) = collide_unit_box(&edge, Vec2::new(-0.495, 0.49));

        assert_eq!(manifold.manifold_type, ManifoldType::FaceA);
        assert_eq!(manifold.point_count, 2);
        assert!((world.normal - Vec2::Y).length() < 1e-4);
        // Back side limits run from the flipped next normal to the flipped previous normal.
        let lower = -right_normal(Vec2::new(2.0, 0.0), vertex3);
        let upper = -right_normal(vertex0, Vec2::ZERO);
        assert_within(world.normal, lower, upper);
        assert_on_edge(&manifold, &world);
    }
}
