pub mod collision_tasks;

pub mod collision_task_registry;
pub mod contact;
pub mod contact_manifold;
pub mod narrow_phase;
pub mod narrow_phase_callbacks;
pub mod pair_cache;
pub mod spatial_hash;
