use std::collections::HashMap;

use anyhow::Result;
use lodestone_chunk::pos::CHUNK_WIDTH;
use lodestone_chunk::{BlockRegistry, Chunk, ChunkPos};

/// Describes a chunk by block names and turns it into runtime ids on `build`.
#[derive(Default)]
pub struct ChunkBuilder {
    // Key: (x, y, z) in chunk-local coordinates, Value: (name, meta)
    custom_blocks: HashMap<(u8, i32, u8), (String, u8)>,

    // Key: y, Value: (name, meta) filling the whole 16x16 layer
    full_layers: HashMap<i32, (String, u8)>,
}

impl ChunkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single block at chunk-local coordinates (x: 0..15, z: 0..15).
    /// Out-of-range coordinates are ignored.
    pub fn set_block(&mut self, x: u8, y: i32, z: u8, name: &str, meta: u8) {
        if (x as usize) < CHUNK_WIDTH && (z as usize) < CHUNK_WIDTH {
            self.custom_blocks.insert((x, y, z), (name.to_string(), meta));
        }
    }

    /// Fill an entire Y-layer with a block.
    pub fn fill_layer(&mut self, y: i32, name: &str, meta: u8) {
        self.full_layers.insert(y, (name.to_string(), meta));
        // Single blocks at this Y are overwritten by the layer
        self.custom_blocks.retain(|(_, by, _), _| *by != y);
    }

    pub fn build(self, pos: ChunkPos, blocks: &BlockRegistry) -> Result<Chunk> {
        let resolve = |name: &str, meta: u8| -> Result<u32> {
            blocks
                .by_name(name, meta)
                .map(|block| block.runtime_id)
                .ok_or_else(|| anyhow::anyhow!("Unknown block {}:{} for chunk {}", name, meta, pos))
        };

        let mut chunk = Chunk::new(pos);

        for (y, (name, meta)) in &self.full_layers {
            let id = resolve(name, *meta)?;
            for x in 0..CHUNK_WIDTH {
                for z in 0..CHUNK_WIDTH {
                    chunk.set_block_runtime_id(x, *y, z, id);
                }
            }
        }

        for ((x, y, z), (name, meta)) in &self.custom_blocks {
            let id = resolve(name, *meta)?;
            chunk.set_block_runtime_id(*x as usize, *y, *z as usize, id);
        }

        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_and_pillar() {
        let blocks = BlockRegistry::with_defaults();
        let mut builder = ChunkBuilder::new();
        builder.fill_layer(0, "minecraft:stone", 0);
        for y in 1..10 {
            builder.set_block(8, y, 8, "stone", 5);
        }

        let chunk = builder.build(ChunkPos::new(32, 13), &blocks).unwrap();
        let stone = blocks.by_name("stone", 0).unwrap().runtime_id;
        let andesite = blocks.by_name("stone", 5).unwrap().runtime_id;

        assert_eq!(chunk.pos(), ChunkPos::new(32, 13));
        assert_eq!(chunk.get_block_runtime_id(0, 0, 15), stone);
        assert_eq!(chunk.get_block_runtime_id(8, 9, 8), andesite);
        assert_eq!(chunk.get_highest_block_at(8, 8), Some(9));
        assert_eq!(chunk.get_highest_block_at(0, 0), Some(0));
    }

    #[test]
    fn test_layer_overrides_earlier_blocks() {
        let blocks = BlockRegistry::with_defaults();
        let mut builder = ChunkBuilder::new();
        builder.set_block(1, 4, 1, "minecraft:glass", 0);
        builder.fill_layer(4, "minecraft:dirt", 0);

        let chunk = builder.build(ChunkPos::new(0, 0), &blocks).unwrap();
        let dirt = blocks.by_name("dirt", 0).unwrap().runtime_id;
        assert_eq!(chunk.get_block_runtime_id(1, 4, 1), dirt);
    }

    #[test]
    fn test_out_of_range_block_ignored() {
        let blocks = BlockRegistry::with_defaults();
        let mut builder = ChunkBuilder::new();
        builder.set_block(CHUNK_WIDTH as u8, 10, 0, "minecraft:stone", 0);
        builder.set_block(0, 10, 200, "minecraft:stone", 0);
        builder.set_block(15, 10, 15, "minecraft:dirt", 0);

        let chunk = builder.build(ChunkPos::new(0, 0), &blocks).unwrap();
        let dirt = blocks.by_name("dirt", 0).unwrap().runtime_id;
        assert_eq!(chunk.get_highest_block_at(0, 0), None);
        assert_eq!(chunk.get_highest_block_at(15, 15), Some(10));
        assert_eq!(chunk.get_block_runtime_id(15, 10, 15), dirt);
    }

    #[test]
    fn test_unknown_block_fails() {
        let blocks = BlockRegistry::with_defaults();
        let mut builder = ChunkBuilder::new();
        builder.fill_layer(0, "minecraft:unobtainium", 0);
        assert!(builder.build(ChunkPos::new(0, 0), &blocks).is_err());
    }
}
