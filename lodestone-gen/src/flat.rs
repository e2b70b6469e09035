use anyhow::Result;
use lodestone_chunk::{Chunk, ChunkPos};

use crate::builder::ChunkBuilder;
use crate::{WorldGenerator, WorldView};

/// One horizontal band of a flat world, listed bottom to top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatLayer {
    pub block: String,
    pub meta: u8,
    pub thickness: u32,
}

impl FlatLayer {
    pub fn new(block: &str, meta: u8, thickness: u32) -> Self {
        Self {
            block: block.to_string(),
            meta,
            thickness,
        }
    }
}

/// Superflat world: identical layers in every chunk, starting at y = 0.
pub struct FlatGenerator {
    layers: Vec<FlatLayer>,
}

impl FlatGenerator {
    pub fn new(layers: Vec<FlatLayer>) -> Self {
        Self { layers }
    }

    /// Parse a layer preset such as `bedrock,3*stone,2*dirt,grass`.
    ///
    /// Each entry is `[count*]name[@meta]`; names without a namespace get `minecraft:`.
    pub fn from_preset(preset: &str) -> Result<Self> {
        let mut layers = Vec::new();
        for entry in preset.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (thickness, rest) = match entry.split_once('*') {
                Some((count, rest)) => (
                    count
                        .trim()
                        .parse::<u32>()
                        .map_err(|e| anyhow::anyhow!("Bad layer count in '{}': {}", entry, e))?,
                    rest.trim(),
                ),
                None => (1, entry),
            };
            let (name, meta) = match rest.split_once('@') {
                Some((name, meta)) => (
                    name,
                    meta.parse::<u8>()
                        .map_err(|e| anyhow::anyhow!("Bad layer meta in '{}': {}", entry, e))?,
                ),
                None => (rest, 0),
            };
            let name = if name.contains(':') {
                name.to_string()
            } else {
                format!("minecraft:{}", name)
            };
            layers.push(FlatLayer {
                block: name,
                meta,
                thickness,
            });
        }

        if layers.is_empty() {
            anyhow::bail!("Flat preset '{}' has no layers", preset);
        }
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[FlatLayer] {
        &self.layers
    }

    /// Y of the topmost block, or None if every layer is empty.
    pub fn surface_height(&self) -> Option<i32> {
        let total: u32 = self.layers.iter().map(|l| l.thickness).sum();
        (total > 0).then(|| total as i32 - 1)
    }
}

impl Default for FlatGenerator {
    /// Bedrock at y=0, stone 1..=3, dirt 4..=5, grass at 6.
    fn default() -> Self {
        Self::new(vec![
            FlatLayer::new("minecraft:bedrock", 0, 1),
            FlatLayer::new("minecraft:stone", 0, 3),
            FlatLayer::new("minecraft:dirt", 0, 2),
            FlatLayer::new("minecraft:grass", 0, 1),
        ])
    }
}

impl WorldGenerator for FlatGenerator {
    fn name(&self) -> &str {
        "flat"
    }

    fn generate_chunk(&self, pos: ChunkPos, world: &dyn WorldView) -> Result<Chunk> {
        let mut builder = ChunkBuilder::new();

        let mut y = 0;
        for layer in &self.layers {
            for _ in 0..layer.thickness {
                builder.fill_layer(y, &layer.block, layer.meta);
                y += 1;
            }
        }

        builder.build(pos, world.blocks())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EmptyView;
    use lodestone_chunk::BlockRegistry;

    #[test]
    fn test_default_layers() {
        let view = EmptyView(BlockRegistry::with_defaults());
        let generator = FlatGenerator::default();
        let chunk = generator.generate_chunk(ChunkPos::new(-4, 9), &view).unwrap();

        let blocks = view.blocks();
        let id = |name: &str| blocks.by_name(name, 0).unwrap().runtime_id;
        assert_eq!(chunk.get_block_runtime_id(0, 0, 0), id("bedrock"));
        assert_eq!(chunk.get_block_runtime_id(3, 3, 3), id("stone"));
        assert_eq!(chunk.get_block_runtime_id(5, 5, 5), id("dirt"));
        assert_eq!(chunk.get_block_runtime_id(15, 6, 15), id("grass"));
        assert_eq!(chunk.get_block_runtime_id(15, 7, 15), 0);

        for x in 0..16 {
            for z in 0..16 {
                assert_eq!(chunk.get_highest_block_at(x, z), Some(6));
            }
        }
        assert_eq!(generator.surface_height(), Some(6));
    }

    #[test]
    fn test_preset_parsing() {
        let generator = FlatGenerator::from_preset("bedrock, 3*stone@5 ,minecraft:grass").unwrap();
        assert_eq!(
            generator.layers(),
            &[
                FlatLayer::new("minecraft:bedrock", 0, 1),
                FlatLayer::new("minecraft:stone", 5, 3),
                FlatLayer::new("minecraft:grass", 0, 1),
            ]
        );
        assert_eq!(generator.surface_height(), Some(4));
    }

    #[test]
    fn test_bad_presets() {
        assert!(FlatGenerator::from_preset("").is_err());
        assert!(FlatGenerator::from_preset("x*stone").is_err());
        assert!(FlatGenerator::from_preset("stone@999").is_err());
    }
}
