mod bounding_box;
pub use self::bounding_box::*;

pub mod math_helper;
pub mod memory;
