use glam::Vec2;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Provides simple axis-aligned bounding box functionality.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    /// Location with the lowest X and Y coordinates in the axis-aligned bounding box.
    pub min: Vec2,
    /// Location with the highest X and Y coordinates in the axis-aligned bounding box.
    pub max: Vec2,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: Vec2::ZERO,
            max: Vec2::ZERO,
        }
    }
}

impl BoundingBox {
    /// Constructs a bounding box from the specified minimum and maximum.
    #[inline]
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Constructs a bounding box around a center with the given half extents.
    #[inline]
    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Determines if a bounding box intersects another bounding box. Touching boxes intersect.
    #[inline]
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.max.x < other.min.x
            || other.max.x < self.min.x
            || self.max.y < other.min.y
            || other.max.y < self.min.y)
    }

    /// Gets whether this box fully contains another box.
    #[inline]
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    /// Gets whether a point lies inside or on the boundary of the box.
    #[inline]
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Computes a bounding box which contains two other bounding boxes.
    #[inline]
    pub fn merged(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns the box grown by `amount` on every side.
    #[inline]
    pub fn expanded(&self, amount: f32) -> BoundingBox {
        let margin = Vec2::splat(amount);
        BoundingBox {
            min: self.min - margin,
            max: self.max + margin,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        0.5 * (self.min + self.max)
    }

    #[inline]
    pub fn half_extents(&self) -> Vec2 {
        0.5 * (self.max - self.min)
    }

    #[inline]
    pub fn perimeter(&self) -> f32 {
        let diagonal = self.max - self.min;
        2.0 * (diagonal.x + diagonal.y)
    }

    /// Gets whether min <= max on both axes and all values are finite.
    pub fn is_valid(&self) -> bool {
        let d = self.max - self.min;
        d.x >= 0.0 && d.y >= 0.0 && self.min.is_finite() && self.max.is_finite()
    }

    /// Slab test of the segment `start + t * (end - start)`, `t` in `[0, 1]`.
    /// Returns the entry fraction, which is 0 when the segment starts inside the box.
    pub fn ray_cast(&self, start: Vec2, end: Vec2) -> Option<f32> {
        let d = end - start;
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;

        for axis in 0..2 {
            let (s, dir, lo, hi) = match axis {
                0 => (start.x, d.x, self.min.x, self.max.x),
                _ => (start.y, d.y, self.min.y, self.max.y),
            };
            if dir.abs() < f32::EPSILON {
                // Parallel to the slab.
                if s < lo || s > hi {
                    return None;
                }
            } else {
                let inv_d = 1.0 / dir;
                let mut t1 = (lo - s) * inv_d;
                let mut t2 = (hi - s) * inv_d;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return None;
                }
            }
        }
        Some(t_min)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.min, self.max)
    }
}
