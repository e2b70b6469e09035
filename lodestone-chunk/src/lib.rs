//! Chunk data model shared by every lodestone crate: coordinates, voxel
//! storage, block registries and the on-disk chunk format.

pub mod block;
pub mod chunk;
pub mod codec;
pub mod pos;

pub use block::{Block, BlockRegistry};
pub use chunk::{AIR, Chunk, Section};
pub use pos::{ChunkPos, local_coord};
