use anyhow::Result;
use lodestone_chunk::{Chunk, ChunkPos};

use crate::{WorldGenerator, WorldView};

/// Generates chunks containing nothing but air.
pub struct VoidGenerator;

impl WorldGenerator for VoidGenerator {
    fn name(&self) -> &str {
        "void"
    }

    fn generate_chunk(&self, pos: ChunkPos, _world: &dyn WorldView) -> Result<Chunk> {
        Ok(Chunk::new(pos))
    }
}
