//! Shared leaf types for the ember server: positions, directions, small
//! vector math and lock aliases. Everything here is dependency-light so the
//! other crates can use it freely.

pub mod direction;
pub mod locks;
pub mod math;
pub mod types;

pub use direction::Direction;
pub use types::{BlockPos, BlockStateId, PackedChunkPos, WorldBlockPos, WorldChunkPos};
