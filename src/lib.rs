//! 2D rigid body collision detection and contact solving.
//!
//! Shapes (circles, convex polygons, edges and chains) are attached to bodies through
//! fixtures. Each step, a uniform-grid [`SpatialHash`] finds candidate pairs, the
//! [`PairCache`] keeps one [`Contact`] per touching pair and regenerates its manifold, and the
//! [`ContactSolver`] resolves the contacts with sequential impulses and Baumgarte position
//! correction. [`Simulation`] drives the whole pipeline.
//!
//! [`SpatialHash`]: physics::collision_detection::spatial_hash::SpatialHash
//! [`PairCache`]: physics::collision_detection::pair_cache::PairCache
//! [`Contact`]: physics::collision_detection::contact::Contact
//! [`ContactSolver`]: physics::constraints::contact::contact_solver::ContactSolver
//! [`Simulation`]: physics::simulation::Simulation

pub mod error;
pub mod physics;
pub mod utilities;

pub use error::PhysicsError;
pub use physics::body_description::{BodyDescription, BodyType};
pub use physics::body_properties::{BodyVelocity, RigidPose, Rot};
pub use physics::collidables::chain::ChainShape;
pub use physics::collidables::circle::CircleShape;
pub use physics::collidables::edge::EdgeShape;
pub use physics::collidables::fixture::{CollisionFilter, FixtureDescription};
pub use physics::collidables::polygon::PolygonShape;
pub use physics::collidables::shape::{Shape, ShapeType};
pub use physics::collision_detection::narrow_phase_callbacks::{
    ContactCallbacks, ContactImpulse, NoContactCallbacks, VetoPolicy,
};
pub use physics::handles::{BodyHandle, ContactHandle, FixtureHandle, FixtureProxy};
pub use physics::settings::SimulationSettings;
pub use physics::simulation::Simulation;
