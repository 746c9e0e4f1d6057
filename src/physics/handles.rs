use std::hash::Hash;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// Newtype Pattern for enhanced type safety
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyHandle(pub u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixtureHandle(pub u32);

/// Stable reference to a pooled contact slot. The generation changes every time the slot is
/// recycled, so a handle to a destroyed contact never aliases its successor. The default handle
/// names slot 0 at generation 0 and is only a placeholder in pooled solver data.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactHandle {
    pub index: u32,
    pub generation: u32,
}

impl ContactHandle {
    #[inline(always)]
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// One child of a fixture's shape, as registered in the broadphase.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixtureProxy {
    pub fixture: FixtureHandle,
    pub child_index: u32,
}

impl FixtureProxy {
    #[inline(always)]
    pub fn new(fixture: FixtureHandle, child_index: u32) -> Self {
        Self {
            fixture,
            child_index,
        }
    }
}

// Simple implementations for Display for user-friendliness
impl std::fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "BodyHandle<{}>", self.0)
    }
}

impl std::fmt::Display for FixtureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "FixtureHandle<{}>", self.0)
    }
}

impl std::fmt::Display for ContactHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "ContactHandle<{}:{}>", self.index, self.generation)
    }
}

impl std::fmt::Display for FixtureProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "<{}, child {}>", self.fixture, self.child_index)
    }
}
