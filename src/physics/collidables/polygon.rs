use glam::Vec2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::physics::body_properties::{RigidPose, Rot};
use crate::physics::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS};
use crate::utilities::math_helper::{cross, cross_vs, EPSILON};
use crate::utilities::BoundingBox;

use super::ray::{RayCastInput, RayCastOutput};
use super::shape::{validate_density, MassData};

/// Collision shape representing a convex polygon with counter-clockwise winding.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolygonShape {
    vertices: Vec<Vec2>,
    /// Outward unit normal of the edge starting at the vertex with the same index.
    normals: Vec<Vec2>,
    radius: f32,
    density: f32,
    mass_data: MassData,
}

impl PolygonShape {
    /// Creates a polygon from convex vertices in either winding order. Concave or
    /// self-intersecting outlines are rejected. Clockwise input is
    /// reversed so the stored winding is always counter-clockwise.
    pub fn new(vertices: &[Vec2], density: f32) -> Result<Self, PhysicsError> {
        validate_density(density)?;
        let mut shape = Self {
            vertices: Vec::new(),
            normals: Vec::new(),
            radius: POLYGON_RADIUS,
            density,
            mass_data: MassData::default(),
        };
        shape.set_vertices(vertices)?;
        Ok(shape)
    }

    /// Creates an axis-aligned box with the given half extents centered on the shape origin.
    pub fn new_box(half_width: f32, half_height: f32, density: f32) -> Result<Self, PhysicsError> {
        Self::new(&box_vertices(half_width, half_height), density)
    }

    /// Replaces the geometry with an axis-aligned box.
    pub fn set_as_box(&mut self, half_width: f32, half_height: f32) -> Result<(), PhysicsError> {
        self.set_vertices(&box_vertices(half_width, half_height))
    }

    /// Replaces the geometry with a box centered on `center` and rotated by `angle`.
    pub fn set_as_oriented_box(
        &mut self,
        half_width: f32,
        half_height: f32,
        center: Vec2,
        angle: f32,
    ) -> Result<(), PhysicsError> {
        let pose = RigidPose {
            position: center,
            rotation: Rot::from_angle(angle),
        };
        let vertices = box_vertices(half_width, half_height).map(|v| pose.transform(v));
        self.set_vertices(&vertices)
    }

    /// Replaces the geometry. Validates count, area, edge lengths and convexity before touching
    /// any state. Vertices that are collinear within the linear slop are accepted.
    pub fn set_vertices(&mut self, vertices: &[Vec2]) -> Result<(), PhysicsError> {
        let count = vertices.len();
        if count < 3 {
            return Err(PhysicsError::TooFewVertices {
                shape: "polygon",
                count,
                minimum: 3,
            });
        }
        if count > MAX_POLYGON_VERTICES {
            return Err(PhysicsError::TooManyVertices {
                count,
                maximum: MAX_POLYGON_VERTICES,
            });
        }

        let mut twice_area = 0.0;
        for i in 0..count {
            twice_area += cross(vertices[i], vertices[(i + 1) % count]);
        }
        if twice_area.abs() <= EPSILON {
            return Err(PhysicsError::ZeroArea);
        }

        let mut ordered = vertices.to_vec();
        if twice_area < 0.0 {
            ordered.reverse();
        }

        let mut normals = Vec::with_capacity(count);
        for i in 0..count {
            let edge = ordered[(i + 1) % count] - ordered[i];
            if edge.length_squared() <= LINEAR_SLOP * LINEAR_SLOP {
                return Err(PhysicsError::DegenerateEdge { index: i });
            }
            normals.push(cross_vs(edge, 1.0).normalize());
        }

        // Every vertex must lie behind every face, within slop.
        for (v, n) in ordered.iter().zip(&normals) {
            if let Some(index) = ordered
                .iter()
                .position(|other| n.dot(*other - *v) > LINEAR_SLOP)
            {
                return Err(PhysicsError::NotConvex { index });
            }
        }

        self.vertices = ordered;
        self.normals = normals;
        self.compute_properties();
        Ok(())
    }

    pub fn set_density(&mut self, density: f32) -> Result<(), PhysicsError> {
        validate_density(density)?;
        self.density = density;
        self.compute_properties();
        Ok(())
    }

    #[inline(always)]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    #[inline(always)]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    #[inline(always)]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline(always)]
    pub fn density(&self) -> f32 {
        self.density
    }

    #[inline(always)]
    pub fn mass_data(&self) -> &MassData {
        &self.mass_data
    }

    #[inline(always)]
    pub fn centroid(&self) -> Vec2 {
        self.mass_data.centroid
    }

    fn compute_properties(&mut self) {
        // Fan triangles around the vertex average.
        let count = self.vertices.len();
        let s = self.vertices.iter().copied().sum::<Vec2>() / count as f32;

        const INV3: f32 = 1.0 / 3.0;
        let mut area = 0.0;
        let mut center = Vec2::ZERO;
        let mut inertia = 0.0;

        for i in 0..count {
            let e1 = self.vertices[i] - s;
            let e2 = self.vertices[(i + 1) % count] - s;
            let d = cross(e1, e2);

            let triangle_area = 0.5 * d;
            area += triangle_area;
            center += triangle_area * INV3 * (e1 + e2);

            let intx2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let inty2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (0.25 * INV3 * d) * (intx2 + inty2);
        }

        debug_assert!(area > EPSILON);
        let mass = self.density * area;
        center /= area;
        let centroid = center + s;

        // Inertia is accumulated about `s`; move it to the centroid, then to the shape origin.
        let inertia = self.density * inertia
            + mass * (centroid.dot(centroid) - center.dot(center));

        self.mass_data = MassData {
            area,
            mass,
            centroid,
            inertia,
        };
    }

    /// Half-space test against every face.
    pub fn test_point(&self, transform: &RigidPose, point: Vec2) -> bool {
        let local = transform.transform_by_inverse(point);
        self.vertices
            .iter()
            .zip(&self.normals)
            .all(|(v, n)| n.dot(local - *v) <= 0.0)
    }

    /// Clips the segment's `[lower, upper]` fraction interval against every face plane.
    pub fn ray_cast(&self, input: &RayCastInput, transform: &RigidPose) -> Option<RayCastOutput> {
        let p1 = transform.transform_by_inverse(input.p1);
        let p2 = transform.transform_by_inverse(input.p2);
        let d = p2 - p1;

        let mut lower = 0.0f32;
        let mut upper = input.max_fraction;
        let mut index = None;

        for (i, (v, n)) in self.vertices.iter().zip(&self.normals).enumerate() {
            // p = p1 + a * d
            // dot(normal, p - v) = 0
            // dot(normal, p1 - v) + a * dot(normal, d) = 0
            let numerator = n.dot(*v - p1);
            let denominator = n.dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // Entering this half-space.
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // Leaving this half-space.
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        debug_assert!(0.0 <= lower && lower <= input.max_fraction);
        index.map(|i| RayCastOutput {
            normal: transform.rotation.apply(self.normals[i]),
            fraction: lower,
        })
    }

    pub fn compute_aabb(&self, transform: &RigidPose) -> BoundingBox {
        let first = transform.transform(self.vertices[0]);
        let (min, max) = self.vertices[1..]
            .iter()
            .map(|v| transform.transform(*v))
            .fold((first, first), |(min, max), v| (min.min(v), max.max(v)));
        BoundingBox::new(min, max).expanded(self.radius)
    }

    /// Area and centroid of the part of the polygon below the plane `dot(normal, x) = offset`.
    pub fn compute_submerged_area(
        &self,
        normal: Vec2,
        offset: f32,
        transform: &RigidPose,
    ) -> (f32, Vec2) {
        // Plane in shape space.
        let normal_local = transform.rotation.apply_inverse(normal);
        let offset_local = offset - normal.dot(transform.position);

        let count = self.vertices.len();
        let mut depths = [0.0f32; MAX_POLYGON_VERTICES];
        let mut dive_count = 0;
        let mut into_index: Option<usize> = None;
        let mut out_index: Option<usize> = None;

        let mut last_submerged = false;
        for i in 0..count {
            depths[i] = normal_local.dot(self.vertices[i]) - offset_local;
            let submerged = depths[i] < -EPSILON;
            if i > 0 {
                if submerged {
                    if !last_submerged {
                        into_index = Some(i - 1);
                        dive_count += 1;
                    }
                } else if last_submerged {
                    out_index = Some(i - 1);
                    dive_count += 1;
                }
            }
            last_submerged = submerged;
        }

        let (into_index, out_index) = match dive_count {
            0 => {
                return if last_submerged {
                    // Completely submerged.
                    (self.mass_data.area, transform.transform(self.mass_data.centroid))
                } else {
                    (0.0, Vec2::ZERO)
                };
            }
            1 => match (into_index, out_index) {
                // The wrap-around edge closes the crossing pair.
                (None, Some(out)) => (count - 1, out),
                (Some(into), _) => (into, count - 1),
                (None, None) => return (0.0, Vec2::ZERO),
            },
            _ => match (into_index, out_index) {
                (Some(into), Some(out)) => (into, out),
                _ => return (0.0, Vec2::ZERO),
            },
        };

        let into_index2 = (into_index + 1) % count;
        let out_index2 = (out_index + 1) % count;

        let into_lambda = (0.0 - depths[into_index]) / (depths[into_index2] - depths[into_index]);
        let out_lambda = (0.0 - depths[out_index]) / (depths[out_index2] - depths[out_index]);

        let into_vec = self.vertices[into_index] * (1.0 - into_lambda)
            + self.vertices[into_index2] * into_lambda;
        let out_vec =
            self.vertices[out_index] * (1.0 - out_lambda) + self.vertices[out_index2] * out_lambda;

        // Fan the submerged sub-polygon from the entry point.
        const INV3: f32 = 1.0 / 3.0;
        let mut area = 0.0;
        let mut center = Vec2::ZERO;
        let mut p2 = self.vertices[into_index2];

        let mut i = into_index2;
        while i != out_index2 {
            i = (i + 1) % count;
            let p3 = if i == out_index2 { out_vec } else { self.vertices[i] };

            let triangle_area = 0.5 * cross(p2 - into_vec, p3 - into_vec);
            area += triangle_area;
            center += triangle_area * INV3 * (into_vec + p2 + p3);

            p2 = p3;
        }

        if area <= EPSILON {
            return (0.0, Vec2::ZERO);
        }
        center /= area;
        (area, transform.transform(center))
    }

    pub fn compare_to(&self, other: &PolygonShape) -> bool {
        self.radius == other.radius && self.vertices == other.vertices
    }
}

fn box_vertices(half_width: f32, half_height: f32) -> [Vec2; 4] {
    [
        Vec2::new(-half_width, -half_height),
        Vec2::new(half_width, -half_height),
        Vec2::new(half_width, half_height),
        Vec2::new(-half_width, half_height),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular(count: usize, radius: f32, offset: Vec2) -> Vec<Vec2> {
        (0..count)
            .map(|i| {
                let angle = i as f32 / count as f32 * std::f32::consts::TAU;
                offset + radius * Vec2::new(angle.cos(), angle.sin())
            })
            .collect()
    }

    #[test]
    fn box_mass_properties() {
        let shape = PolygonShape::new_box(1.0, 0.5, 2.0).unwrap();
        let md = shape.mass_data();
        assert!((md.area - 2.0).abs() < 1e-5);
        assert!((md.mass - 4.0).abs() < 1e-5);
        assert!(md.centroid.length() < 1e-5);
        // m * (w^2 + h^2) / 12 with w = 2, h = 1
        assert!((md.inertia - 4.0 * 5.0 / 12.0).abs() < 1e-4);
    }

    #[test]
    fn clockwise_input_is_reordered() {
        let ccw = regular(5, 1.0, Vec2::ZERO);
        let mut cw = ccw.clone();
        cw.reverse();
        let a = PolygonShape::new(&ccw, 1.0).unwrap();
        let b = PolygonShape::new(&cw, 1.0).unwrap();
        assert!(b.mass_data().area > 0.0);
        assert!((a.mass_data().area - b.mass_data().area).abs() < 1e-5);
        assert!((a.mass_data().inertia - b.mass_data().inertia).abs() < 1e-4);
        for (v, n) in b.vertices().iter().zip(b.normals()) {
            // Outward normals point away from the centroid.
            assert!(n.dot(*v - b.centroid()) > 0.0);
        }
    }

    #[test]
    fn mass_properties_follow_translation() {
        let offset = Vec2::new(3.0, -2.0);
        let a = PolygonShape::new(&regular(6, 1.0, Vec2::ZERO), 1.5).unwrap();
        let b = PolygonShape::new(&regular(6, 1.0, offset), 1.5).unwrap();
        let (ma, mb) = (a.mass_data(), b.mass_data());

        assert!((mb.centroid - (ma.centroid + offset)).length() < 1e-4);
        // Parallel axis: I_origin = I_centroid + m * |c|^2.
        let ia_centroid = ma.inertia - ma.mass * ma.centroid.length_squared();
        let ib_centroid = mb.inertia - mb.mass * mb.centroid.length_squared();
        assert!((ia_centroid - ib_centroid).abs() < 1e-3);
        assert!((mb.inertia - (ia_centroid + mb.mass * offset.length_squared())).abs() < 1e-2);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            PolygonShape::new(&[Vec2::ZERO, Vec2::X], 1.0),
            Err(PhysicsError::TooFewVertices { .. })
        ));
        assert!(matches!(
            PolygonShape::new(&regular(9, 1.0, Vec2::ZERO), 1.0),
            Err(PhysicsError::TooManyVertices { .. })
        ));
        assert!(matches!(
            PolygonShape::new(&[Vec2::ZERO, Vec2::X, Vec2::new(2.0, 0.0)], 1.0),
            Err(PhysicsError::ZeroArea)
        ));
        assert!(matches!(
            PolygonShape::new(
                &[Vec2::ZERO, Vec2::new(0.001, 0.0), Vec2::new(1.0, 1.0)],
                1.0
            ),
            Err(PhysicsError::DegenerateEdge { index: 0 })
        ));
    }

    #[test]
    fn rejects_concave_and_self_intersecting_outlines() {
        let arrow = [
            Vec2::new(-1.0, -1.0),
            Vec2::new(0.0, -0.2),
            Vec2::new(1.0, -1.0),
            Vec2::new(0.0, 1.0),
        ];
        // The notch at vertex 1 puts vertex 2 outside the first face.
        assert_eq!(
            PolygonShape::new(&arrow, 1.0),
            Err(PhysicsError::NotConvex { index: 2 })
        );

        // Five points of a regular pentagon visited every second vertex.
        let pentagon = regular(5, 1.0, Vec2::ZERO);
        let star: Vec<Vec2> = (0..5).map(|i| pentagon[(2 * i) % 5]).collect();
        assert!(matches!(
            PolygonShape::new(&star, 1.0),
            Err(PhysicsError::NotConvex { .. })
        ));

        let mut shape = PolygonShape::new_box(1.0, 1.0, 1.0).unwrap();
        assert!(shape.set_vertices(&arrow).is_err());
        assert_eq!(shape.vertices().len(), 4);
        assert!((shape.mass_data().area - 4.0).abs() < 1e-5);
    }

    #[test]
    fn accepts_collinear_vertices() {
        let shape = PolygonShape::new(
            &[
                Vec2::new(-1.0, -1.0),
                Vec2::new(0.0, -1.0),
                Vec2::new(1.0, -1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(-1.0, 1.0),
            ],
            1.0,
        )
        .unwrap();
        assert!((shape.mass_data().area - 4.0).abs() < 1e-5);
        assert!(shape.mass_data().centroid.length() < 1e-5);
    }

    #[test]
    fn point_test_uses_every_face() {
        let shape = PolygonShape::new_box(1.0, 1.0, 1.0).unwrap();
        let pose = RigidPose::new(Vec2::new(5.0, 0.0), std::f32::consts::FRAC_PI_4);
        assert!(shape.test_point(&pose, Vec2::new(5.0, 1.3)));
        assert!(!shape.test_point(&pose, Vec2::new(6.0, 1.0)));
    }

    #[test]
    fn ray_reports_entering_face() {
        let shape = PolygonShape::new_box(1.0, 1.0, 1.0).unwrap();
        let input = RayCastInput::new(Vec2::new(-4.0, 0.0), Vec2::new(4.0, 0.0));
        let hit = shape.ray_cast(&input, &RigidPose::IDENTITY).unwrap();
        assert!((hit.fraction - 3.0 / 8.0).abs() < 1e-5);
        assert!((hit.normal - Vec2::new(-1.0, 0.0)).length() < 1e-5);

        let miss = RayCastInput::new(Vec2::new(-4.0, 2.0), Vec2::new(4.0, 2.0));
        assert!(shape.ray_cast(&miss, &RigidPose::IDENTITY).is_none());
        // Starting inside never enters a face.
        let inside = RayCastInput::new(Vec2::ZERO, Vec2::new(4.0, 0.0));
        assert!(shape.ray_cast(&inside, &RigidPose::IDENTITY).is_none());
    }

    #[test]
    fn aabb_includes_skin() {
        let shape = PolygonShape::new_box(1.0, 2.0, 1.0).unwrap();
        let aabb = shape.compute_aabb(&RigidPose::from_position(Vec2::new(1.0, 1.0)));
        assert!((aabb.min - Vec2::new(-POLYGON_RADIUS, -1.0 - POLYGON_RADIUS)).length() < 1e-6);
        assert!((aabb.max - Vec2::new(2.0 + POLYGON_RADIUS, 3.0 + POLYGON_RADIUS)).length() < 1e-6);
    }

    #[test]
    fn submerged_area_of_half_box() {
        let shape = PolygonShape::new_box(1.0, 1.0, 1.0).unwrap();
        let (area, centroid) = shape.compute_submerged_area(Vec2::Y, 0.0, &RigidPose::IDENTITY);
        assert!((area - 2.0).abs() < 1e-4);
        assert!((centroid - Vec2::new(0.0, -0.5)).length() < 1e-4);

        let (wet, wet_centroid) =
            shape.compute_submerged_area(Vec2::Y, 10.0, &RigidPose::IDENTITY);
        assert!((wet - 4.0).abs() < 1e-4);
        assert!(wet_centroid.length() < 1e-4);

        let (dry, _) = shape.compute_submerged_area(Vec2::Y, -10.0, &RigidPose::IDENTITY);
        assert_eq!(dry, 0.0);
    }

    #[test]
    fn submerged_area_with_wraparound_crossing() {
        // Vertex 0 is the only dry vertex, so the exit crossing sits on the closing edge.
        let shape = PolygonShape::new(
            &[
                Vec2::new(0.0, 2.0),
                Vec2::new(-1.0, -1.0),
                Vec2::new(1.0, -1.0),
            ],
            1.0,
        )
        .unwrap();
        let (area, centroid) = shape.compute_submerged_area(Vec2::Y, 0.5, &RigidPose::IDENTITY);
        // Dry tip is a triangle similar to the whole with height 1.5 of 3.
        let expected = 3.0 - 3.0 * 0.25;
        assert!((area - expected).abs() < 1e-3, "area = {area}");
        assert!(centroid.y < 0.5);
    }
}
