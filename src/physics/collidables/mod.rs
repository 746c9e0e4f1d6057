pub mod ray;
pub mod shape;
pub mod fixture;

// Shape primitives
pub mod circle;
pub mod edge;
pub mod polygon;
pub mod chain;
