//! Physics error types.
//!
//! Construction of shapes, fixtures and settings is the only fallible surface of the
//! crate. Narrow phase "no contact" outcomes and solver degeneracies are not errors.

use std::fmt;

/// Unified error type for physics operations.
#[derive(Clone, Debug, PartialEq)]
pub enum PhysicsError {
    /// A shape was given fewer vertices than it needs.
    TooFewVertices {
        /// Kind of shape being built
        shape: &'static str,
        /// Number of vertices provided
        count: usize,
        /// Minimum number of vertices accepted
        minimum: usize,
    },
    /// A polygon was given more vertices than `MAX_POLYGON_VERTICES`.
    TooManyVertices {
        /// Number of vertices provided
        count: usize,
        /// Maximum number of vertices accepted
        maximum: usize,
    },
    /// Two consecutive vertices are closer than the linear slop.
    DegenerateEdge {
        /// Index of the first vertex of the offending edge
        index: usize,
    },
    /// A polygon encloses no area.
    ZeroArea,
    /// A polygon vertex lies outside one of the faces, so the outline is concave or crosses
    /// itself.
    NotConvex {
        /// Index of the offending vertex, in counter-clockwise order
        index: usize,
    },
    /// A radius was negative or not finite.
    InvalidRadius {
        /// The rejected radius
        radius: f32,
    },
    /// A density was negative or not finite.
    InvalidDensity {
        /// The rejected density
        density: f32,
    },
    /// Invalid configuration parameter.
    InvalidConfiguration {
        /// Description of the invalid configuration
        reason: &'static str,
    },
    /// A handle refers to a slot that does not exist or has been recycled.
    InvalidHandle {
        /// Kind of handle
        kind: &'static str,
        /// Slot index carried by the handle
        index: u32,
    },
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewVertices {
                shape,
                count,
                minimum,
            } => write!(f, "{shape} needs at least {minimum} vertices, got {count}"),
            Self::TooManyVertices { count, maximum } => {
                write!(f, "polygon has {count} vertices (maximum={maximum})")
            }
            Self::DegenerateEdge { index } => {
                write!(f, "vertices {index} and {} are too close together", index + 1)
            }
            Self::ZeroArea => write!(f, "polygon has zero area"),
            Self::NotConvex { index } => write!(f, "polygon is not convex at vertex {index}"),
            Self::InvalidRadius { radius } => write!(f, "invalid radius {radius}"),
            Self::InvalidDensity { density } => write!(f, "invalid density {density}"),
            Self::InvalidConfiguration { reason } => {
                write!(f, "invalid configuration: {reason}")
            }
            Self::InvalidHandle { kind, index } => {
                write!(f, "stale or unknown {kind} handle {index}")
            }
        }
    }
}

impl std::error::Error for PhysicsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_counts() {
        let e = PhysicsError::TooFewVertices {
            shape: "chain",
            count: 2,
            minimum: 3,
        };
        let s = e.to_string();
        assert!(s.contains("chain"));
        assert!(s.contains('2'));
        assert!(s.contains('3'));
    }

    #[test]
    fn degenerate_edge_names_both_vertices() {
        let s = PhysicsError::DegenerateEdge { index: 4 }.to_string();
        assert!(s.contains('4') && s.contains('5'));
    }

    #[test]
    fn not_convex_names_the_vertex() {
        let s = PhysicsError::NotConvex { index: 3 }.to_string();
        assert!(s.contains("convex") && s.contains('3'));
    }

    #[test]
    fn variants_compare() {
        assert_ne!(
            PhysicsError::ZeroArea,
            PhysicsError::InvalidConfiguration { reason: "cell size" }
        );
    }
}
