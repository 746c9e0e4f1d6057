pub mod body_description;
pub mod body_properties;
pub mod body_set;
pub mod handles;
pub mod settings;
pub mod solve_description;
pub mod simulation;

pub mod collidables;
pub mod collision_detection;
pub mod constraints;
