//! Uniform grid broadphase.
//!
//! Space is divided into square cells of side `cell_size`; cell `(i, j)` covers
//! `[i * cell_size, (i + 1) * cell_size)` on x and likewise on y. A proxy is stored in every
//! cell its bounds touch. The bounds used at registration are cached and reused on removal, so
//! a proxy always leaves exactly the cells it entered.

use std::hash::Hash;

use glam::Vec2;
use hashbrown::{HashMap, HashSet};
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;
use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::circle::CircleShape;
use crate::physics::collidables::polygon::PolygonShape;
use crate::physics::collidables::ray::RayCastInput;
use crate::physics::collidables::shape::Shape;
use crate::utilities::BoundingBox;

use super::narrow_phase::NarrowPhase;

type CellCoord = (i32, i32);

/// Resolves a registered proxy to its shape child and world transform for exact tests.
pub trait ShapeLookup<T> {
    fn lookup(&self, proxy: T) -> Option<(&Shape, usize, RigidPose)>;
}

/// Result of a [`SpatialHash::linecast`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RaycastHit<T> {
    pub proxy: T,
    /// Fraction along the segment, in `[0, 1]`.
    pub fraction: f32,
    pub point: Vec2,
    pub normal: Vec2,
}

#[derive(Debug, Clone, Copy)]
struct Registration {
    bounds: BoundingBox,
    layer: u32,
}

#[derive(Debug, Clone)]
pub struct SpatialHash<T> {
    cell_size: f32,
    inverse_cell_size: f32,
    cells: HashMap<CellCoord, Vec<T>>,
    registered: HashMap<T, Registration>,
    /// Per-query dedup set.
    checked: HashSet<T>,
    /// Smallest and largest cell coordinates ever populated.
    grid_bounds: Option<(CellCoord, CellCoord)>,
}

impl<T: Copy + Eq + Hash> SpatialHash<T> {
    pub fn new(cell_size: f32) -> Result<Self, PhysicsError> {
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(PhysicsError::InvalidConfiguration {
                reason: "spatial hash cell size must be positive and finite",
            });
        }
        Ok(Self {
            cell_size,
            inverse_cell_size: 1.0 / cell_size,
            cells: HashMap::new(),
            registered: HashMap::new(),
            checked: HashSet::new(),
            grid_bounds: None,
        })
    }

    #[inline(always)]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Gets the cell containing a point.
    #[inline(always)]
    pub fn cell_coords(&self, point: Vec2) -> (i32, i32) {
        (
            (point.x * self.inverse_cell_size).floor() as i32,
            (point.y * self.inverse_cell_size).floor() as i32,
        )
    }

    /// Gets the inclusive range of cells touched by a box.
    fn cell_range(&self, bounds: &BoundingBox) -> (CellCoord, CellCoord) {
        (self.cell_coords(bounds.min), self.cell_coords(bounds.max))
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    pub fn contains(&self, proxy: T) -> bool {
        self.registered.contains_key(&proxy)
    }

    /// Bounds the proxy was registered with.
    pub fn registered_bounds(&self, proxy: T) -> Option<BoundingBox> {
        self.registered.get(&proxy).map(|r| r.bounds)
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Total number of proxy entries over all cells.
    pub fn entry_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    /// Proxies stored in a cell.
    pub fn cell(&self, coords: (i32, i32)) -> &[T] {
        self.cells.get(&coords).map_or(&[], Vec::as_slice)
    }

    /// Smallest and largest cell coordinates populated since the last clear.
    pub fn grid_bounds(&self) -> Option<((i32, i32), (i32, i32))> {
        self.grid_bounds
    }

    /// Whether the cached bounds of two registered proxies overlap.
    pub fn proxies_overlap(&self, a: T, b: T) -> bool {
        match (self.registered.get(&a), self.registered.get(&b)) {
            (Some(a), Some(b)) => a.bounds.intersects(&b.bounds),
            _ => false,
        }
    }

    /// Adds a proxy to every cell its bounds touch. A proxy that is already present is moved.
    pub fn register(&mut self, proxy: T, bounds: BoundingBox, layer: u32) {
        if self.contains(proxy) {
            self.remove(proxy);
        }
        let ((x0, y0), (x1, y1)) = self.cell_range(&bounds);
        for x in x0..=x1 {
            for y in y0..=y1 {
                self.cells.entry((x, y)).or_default().push(proxy);
            }
        }
        self.grid_bounds = Some(match self.grid_bounds {
            Some(((min_x, min_y), (max_x, max_y))) => (
                (min_x.min(x0), min_y.min(y0)),
                (max_x.max(x1), max_y.max(y1)),
            ),
            None => ((x0, y0), (x1, y1)),
        });
        self.registered.insert(proxy, Registration { bounds, layer });
    }

    /// Removes a proxy from the cells of its cached bounds. Returns false if it was not present.
    pub fn remove(&mut self, proxy: T) -> bool {
        let Some(registration) = self.registered.remove(&proxy) else {
            return false;
        };
        let ((x0, y0), (x1, y1)) = self.cell_range(&registration.bounds);
        for x in x0..=x1 {
            for y in y0..=y1 {
                let coords = (x, y);
                let Some(cell) = self.cells.get_mut(&coords) else {
                    continue;
                };
                if let Some(position) = cell.iter().position(|p| *p == proxy) {
                    cell.swap_remove(position);
                }
                if cell.is_empty() {
                    self.cells.remove(&coords);
                }
            }
        }
        true
    }

    /// Re-registers a proxy with new bounds, keeping its layer. Returns false if it was not
    /// present.
    pub fn update(&mut self, proxy: T, bounds: BoundingBox) -> bool {
        let Some(layer) = self.registered.get(&proxy).map(|r| r.layer) else {
            return false;
        };
        self.remove(proxy);
        self.register(proxy, bounds, layer);
        true
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.registered.clear();
        self.checked.clear();
        self.grid_bounds = None;
    }

    /// Collects every proxy whose cached bounds overlap `bounds` and whose layer intersects
    /// `layer_mask`. Returns the number of proxies appended to `results`.
    pub fn aabb_broadphase(
        &mut self,
        bounds: &BoundingBox,
        exclude: Option<T>,
        layer_mask: u32,
        results: &mut Vec<T>,
    ) -> usize {
        self.checked.clear();
        let start = results.len();
        let ((x0, y0), (x1, y1)) = self.cell_range(bounds);
        for x in x0..=x1 {
            for y in y0..=y1 {
                let Some(cell) = self.cells.get(&(x, y)) else {
                    continue;
                };
                for &proxy in cell {
                    if Some(proxy) == exclude || !self.checked.insert(proxy) {
                        continue;
                    }
                    let Some(registration) = self.registered.get(&proxy) else {
                        continue;
                    };
                    if registration.layer & layer_mask != 0
                        && registration.bounds.intersects(bounds)
                    {
                        results.push(proxy);
                    }
                }
            }
        }
        results.len() - start
    }

    /// Collects every proxy whose solid shape overlaps the circle. Collision skins are not
    /// part of the query.
    pub fn overlap_circle(
        &mut self,
        center: Vec2,
        radius: f32,
        layer_mask: u32,
        shapes: &impl ShapeLookup<T>,
        narrow_phase: &mut NarrowPhase,
        results: &mut Vec<T>,
    ) -> Result<usize, PhysicsError> {
        let circle = Shape::Circle(CircleShape::new(radius, 0.0)?);
        let bounds = BoundingBox::from_center_half_extents(center, Vec2::splat(radius));
        let xf = RigidPose::from_position(center);
        Ok(self.overlap_shape(&circle, &xf, &bounds, layer_mask, shapes, narrow_phase, results))
    }

    /// Collects every proxy whose solid shape overlaps the axis aligned rectangle. Collision
    /// skins are not part of the query.
    pub fn overlap_rectangle(
        &mut self,
        rectangle: &BoundingBox,
        layer_mask: u32,
        shapes: &impl ShapeLookup<T>,
        narrow_phase: &mut NarrowPhase,
        results: &mut Vec<T>,
    ) -> Result<usize, PhysicsError> {
        let half = rectangle.half_extents();
        let square = Shape::Polygon(PolygonShape::new_box(half.x, half.y, 0.0)?);
        let xf = RigidPose::from_position(rectangle.center());
        Ok(self.overlap_shape(&square, &xf, rectangle, layer_mask, shapes, narrow_phase, results))
    }

    #[allow(clippy::too_many_arguments)]
    fn overlap_shape(
        &mut self,
        query: &Shape,
        xf: &RigidPose,
        bounds: &BoundingBox,
        layer_mask: u32,
        shapes: &impl ShapeLookup<T>,
        narrow_phase: &mut NarrowPhase,
        results: &mut Vec<T>,
    ) -> usize {
        let start = results.len();
        self.aabb_broadphase(bounds, None, layer_mask, results);
        let mut kept = start;
        for i in start..results.len() {
            let proxy = results[i];
            let overlaps = shapes.lookup(proxy).is_some_and(|(shape, child, shape_xf)| {
                narrow_phase.test_solid_overlap(shape, child, &shape_xf, query, 0, xf)
            });
            if overlaps {
                results[kept] = proxy;
                kept += 1;
            }
        }
        results.truncate(kept);
        kept - start
    }

    /// Casts the segment from `start` to `end` through the grid, visiting cells in order.
    ///
    /// Each proxy is tested once even if it spans several cells: first against its cached
    /// bounds, then against its shape. When `starts_in_colliders` is set, a proxy whose shape
    /// contains `start` is reported at fraction 0 with a normal facing back along the ray;
    /// otherwise such proxies are skipped. Hits are appended to `hits` sorted by fraction and
    /// at most `max_hits` are kept. Returns the number of hits appended.
    #[allow(clippy::too_many_arguments)]
    pub fn linecast(
        &mut self,
        start: Vec2,
        end: Vec2,
        layer_mask: u32,
        starts_in_colliders: bool,
        shapes: &impl ShapeLookup<T>,
        hits: &mut Vec<RaycastHit<T>>,
        max_hits: usize,
    ) -> usize {
        self.checked.clear();
        let first_hit = hits.len();
        let direction = end - start;

        let mut current = self.cell_coords(start);
        let last = self.cell_coords(end);

        let step_x = direction.x.signum() as i32;
        let step_y = direction.y.signum() as i32;
        let (step_x, step_y) = if current == last {
            (0, 0)
        } else {
            (
                if direction.x == 0.0 { 0 } else { step_x },
                if direction.y == 0.0 { 0 } else { step_y },
            )
        };

        // Fraction at which the ray crosses the next cell boundary on each axis, and the
        // fraction needed to cross a whole cell.
        let boundary = |cell: i32, step: i32| (cell + step.max(0)) as f32 * self.cell_size;
        let mut t_max_x = if direction.x != 0.0 {
            (boundary(current.0, step_x) - start.x) / direction.x
        } else {
            f32::MAX
        };
        let mut t_max_y = if direction.y != 0.0 {
            (boundary(current.1, step_y) - start.y) / direction.y
        } else {
            f32::MAX
        };
        let t_delta_x = if direction.x != 0.0 {
            self.cell_size * step_x as f32 / direction.x
        } else {
            f32::MAX
        };
        let t_delta_y = if direction.y != 0.0 {
            self.cell_size * step_y as f32 / direction.y
        } else {
            f32::MAX
        };

        let mut visited = 1usize;
        self.check_cell(current, start, end, layer_mask, starts_in_colliders, shapes, hits);
        while current != last {
            let move_x = if current.0 == last.0 {
                false
            } else if current.1 == last.1 {
                true
            } else {
                t_max_x < t_max_y
            };
            if move_x {
                current.0 += step_x;
                t_max_x += t_delta_x;
            } else {
                current.1 += step_y;
                t_max_y += t_delta_y;
            }
            visited += 1;
            self.check_cell(current, start, end, layer_mask, starts_in_colliders, shapes, hits);
        }

        hits[first_hit..].sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
        hits.truncate(first_hit + max_hits.min(hits.len() - first_hit));
        trace!(visited, hits = hits.len() - first_hit, "linecast");
        hits.len() - first_hit
    }

    #[allow(clippy::too_many_arguments)]
    fn check_cell(
        &mut self,
        coords: CellCoord,
        start: Vec2,
        end: Vec2,
        layer_mask: u32,
        starts_in_colliders: bool,
        shapes: &impl ShapeLookup<T>,
        hits: &mut Vec<RaycastHit<T>>,
    ) {
        let Some(cell) = self.cells.get(&coords) else {
            return;
        };
        let input = RayCastInput::new(start, end);
        for &proxy in cell {
            if !self.checked.insert(proxy) {
                continue;
            }
            let Some(registration) = self.registered.get(&proxy) else {
                continue;
            };
            if registration.layer & layer_mask == 0
                || registration.bounds.ray_cast(start, end).is_none()
            {
                continue;
            }
            let Some((shape, child, xf)) = shapes.lookup(proxy) else {
                continue;
            };

            if shape.test_point(&xf, start) {
                if starts_in_colliders {
                    hits.push(RaycastHit {
                        proxy,
                        fraction: 0.0,
                        point: start,
                        normal: -(end - start).normalize_or_zero(),
                    });
                }
                continue;
            }

            if let Some(output) = shape.ray_cast(&input, &xf, child) {
                hits.push(RaycastHit {
                    proxy,
                    fraction: output.fraction,
                    point: start + output.fraction * (end - start),
                    normal: output.normal,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shapes(Vec<(Shape, RigidPose)>);

    impl ShapeLookup<u32> for Shapes {
        fn lookup(&self, proxy: u32) -> Option<(&Shape, usize, RigidPose)> {
            self.0.get(proxy as usize).map(|(shape, xf)| (shape, 0, *xf))
        }
    }

    impl Shapes {
        fn register_all(&self, hash: &mut SpatialHash<u32>) {
            for (i, (shape, xf)) in self.0.iter().enumerate() {
                hash.register(i as u32, shape.compute_aabb(xf, 0), 1);
            }
        }
    }

    fn circle_at(x: f32, y: f32, r: f32) -> (Shape, RigidPose) {
        (
            CircleShape::new(r, 1.0).unwrap().into(),
            RigidPose::from_position(Vec2::new(x, y)),
        )
    }

    #[test]
    fn register_then_remove_is_symmetric() {
        let mut hash = SpatialHash::new(1.0).unwrap();
        hash.register(7u32, BoundingBox::new(Vec2::ZERO, Vec2::splat(0.5)), 1);
        let cells = hash.cell_count();
        let entries = hash.entry_count();

        let wide = BoundingBox::new(Vec2::new(-2.5, -0.5), Vec2::new(3.2, 1.5));
        hash.register(9u32, wide, 1);
        assert_eq!(hash.entry_count(), entries + 7 * 3);
        assert!(hash.remove(9));
        assert_eq!(hash.cell_count(), cells);
        assert_eq!(hash.entry_count(), entries);
        assert!(!hash.remove(9));
    }

    #[test]
    fn cells_follow_floor() {
        let hash = SpatialHash::<u32>::new(2.0).unwrap();
        assert_eq!(hash.cell_coords(Vec2::new(-0.1, 3.9)), (-1, 1));
        assert_eq!(hash.cell_coords(Vec2::new(4.0, -4.0)), (2, -2));
    }

    #[test]
    fn broadphase_filters_layers_and_bounds() {
        let mut hash = SpatialHash::new(4.0).unwrap();
        hash.register(1u32, BoundingBox::new(Vec2::ZERO, Vec2::ONE), 0b01);
        hash.register(2u32, BoundingBox::new(Vec2::splat(0.5), Vec2::splat(1.5)), 0b10);
        hash.register(3u32, BoundingBox::new(Vec2::splat(3.0), Vec2::splat(3.5)), 0b01);

        let query = BoundingBox::new(Vec2::splat(0.25), Vec2::splat(0.75));
        let mut results = Vec::new();
        hash.aabb_broadphase(&query, None, u32::MAX, &mut results);
        results.sort_unstable();
        assert_eq!(results, vec![1, 2]);

        results.clear();
        hash.aabb_broadphase(&query, Some(1), 0b11, &mut results);
        assert_eq!(results, vec![2]);

        results.clear();
        hash.aabb_broadphase(&query, None, 0b10, &mut results);
        assert_eq!(results, vec![2]);
    }

    #[test]
    fn overlap_circle_uses_exact_shapes() {
        // Bounds of the circle at (1.6, 1.6) overlap the query, the circle itself does not.
        let shapes = Shapes(vec![circle_at(0.0, 0.0, 0.5), circle_at(1.6, 1.6, 0.6)]);
        let mut hash = SpatialHash::new(1.0).unwrap();
        shapes.register_all(&mut hash);
        let mut narrow_phase = NarrowPhase::default();
        let mut results = Vec::new();
        let count = hash
            .overlap_circle(Vec2::new(0.6, 0.6), 0.5, u32::MAX, &shapes, &mut narrow_phase, &mut results)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(results, vec![0]);
    }

    fn box_at(x: f32, y: f32, half: f32) -> (Shape, RigidPose) {
        (
            PolygonShape::new_box(half, half, 1.0).unwrap().into(),
            RigidPose::from_position(Vec2::new(x, y)),
        )
    }

    #[test]
    fn overlap_rectangle_ignores_skins() {
        // The first box sits just right of the query and the circle just past its top right
        // corner. Both are within the combined skins and their bounds touch the query.
        let shapes = Shapes(vec![
            box_at(1.508, 0.0, 0.5),
            circle_at(1.2864, 2.2864, 0.4),
            box_at(1.49, -1.5, 0.5),
        ]);
        let mut hash = SpatialHash::new(1.0).unwrap();
        shapes.register_all(&mut hash);
        let mut narrow_phase = NarrowPhase::default();
        let mut results = Vec::new();
        let rectangle = BoundingBox::new(Vec2::new(-1.0, -2.0), Vec2::new(1.0, 2.0));
        let count = hash
            .overlap_rectangle(&rectangle, u32::MAX, &shapes, &mut narrow_phase, &mut results)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(results, vec![2]);
    }

    #[test]
    fn overlap_circle_ignores_polygon_skin() {
        let shapes = Shapes(vec![box_at(1.508, 0.0, 0.5), box_at(-1.49, 0.0, 0.5)]);
        let mut hash = SpatialHash::new(1.0).unwrap();
        shapes.register_all(&mut hash);
        let mut narrow_phase = NarrowPhase::default();
        let mut results = Vec::new();
        let count = hash
            .overlap_circle(Vec2::ZERO, 1.0, u32::MAX, &shapes, &mut narrow_phase, &mut results)
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(results, vec![1]);
    }

    #[test]
    fn clear_resets_grid_bounds() {
        let mut hash = SpatialHash::new(1.0).unwrap();
        hash.register(1u32, BoundingBox::new(Vec2::splat(-3.5), Vec2::splat(-3.0)), 1);
        hash.register(2u32, BoundingBox::new(Vec2::splat(2.0), Vec2::splat(2.5)), 1);
        assert_eq!(hash.grid_bounds(), Some(((-4, -4), (2, 2))));
        hash.clear();
        assert_eq!(hash.grid_bounds(), None);
        hash.register(3u32, BoundingBox::new(Vec2::ZERO, Vec2::splat(0.5)), 1);
        assert_eq!(hash.grid_bounds(), Some(((0, 0), (0, 0))));
    }

    #[test]
    fn linecast_sorts_and_dedups() {
        let shapes = Shapes(vec![
            circle_at(6.0, 0.0, 1.5),
            circle_at(2.0, 0.0, 0.5),
            circle_at(2.0, 3.0, 0.5),
        ]);
        let mut hash = SpatialHash::new(1.0).unwrap();
        shapes.register_all(&mut hash);
        let mut hits = Vec::new();
        let count = hash.linecast(
            Vec2::new(-1.0, 0.0),
            Vec2::new(9.0, 0.0),
            u32::MAX,
            false,
            &shapes,
            &mut hits,
            8,
        );
        assert_eq!(count, 2);
        assert_eq!(hits[0].proxy, 1);
        assert_eq!(hits[1].proxy, 0);
        assert!((hits[0].point.x - 1.5).abs() < 1e-4);
        assert!((hits[0].normal + Vec2::X).length() < 1e-4);

        hits.clear();
        hash.linecast(
            Vec2::new(-1.0, 0.0),
            Vec2::new(9.0, 0.0),
            u32::MAX,
            false,
            &shapes,
            &mut hits,
            1,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].proxy, 1);
    }

    #[test]
    fn linecast_walks_diagonals() {
        let shapes = Shapes(vec![circle_at(-3.5, -2.5, 0.3)]);
        let mut hash = SpatialHash::new(1.0).unwrap();
        shapes.register_all(&mut hash);
        let mut hits = Vec::new();
        let count = hash.linecast(
            Vec2::new(0.5, 0.5),
            Vec2::new(-5.0, -4.0),
            u32::MAX,
            false,
            &shapes,
            &mut hits,
            4,
        );
        assert_eq!(count, 1);
        assert!(hits[0].fraction > 0.0 && hits[0].fraction < 1.0);
    }

    #[test]
    fn start_inside_policy() {
        let shapes = Shapes(vec![circle_at(0.0, 0.0, 1.0)]);
        let mut hash = SpatialHash::new(1.0).unwrap();
        shapes.register_all(&mut hash);
        let mut hits = Vec::new();
        let start = Vec2::new(0.2, 0.0);
        let end = Vec2::new(4.0, 0.0);
        assert_eq!(hash.linecast(start, end, u32::MAX, false, &shapes, &mut hits, 4), 0);
        assert_eq!(hash.linecast(start, end, u32::MAX, true, &shapes, &mut hits, 4), 1);
        assert_eq!(hits[0].fraction, 0.0);
        assert_eq!(hits[0].point, start);
        assert!((hits[0].normal + Vec2::X).length() < 1e-6);
    }
}
