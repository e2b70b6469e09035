//! Block registries.
//!
//! Two lookups sit between a chunk's numeric runtime ids and block descriptors:
//! - [`BlockMap`]: runtime id <-> `(name, meta)`
//! - [`BlockManager`]: `(name, meta)` -> [`Block`]
//!
//! Runtime ids are assigned in registration order, so air must be registered
//! first to keep id 0 (the value empty chunk storage reads as).

use std::collections::HashMap;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("block {name}:{meta} is already registered")]
    Duplicate { name: String, meta: u8 },

    #[error("first registered block must be minecraft:air, got {0}")]
    AirNotFirst(String),
}

/// A resolved block type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Block {
    pub name: String,
    pub meta: u8,
    pub runtime_id: u32,
}

impl Block {
    pub fn is_air(&self) -> bool {
        self.runtime_id == crate::chunk::AIR
    }
}

/// Runtime id <-> (name, meta) mapping.
#[derive(Debug, Default)]
pub struct BlockMap {
    by_id: Vec<(String, u8)>,
    by_key: HashMap<(String, u8), u32>,
}

impl BlockMap {
    pub fn get_name_and_meta(&self, runtime_id: u32) -> Option<(&str, u8)> {
        self.by_id
            .get(runtime_id as usize)
            .map(|(name, meta)| (name.as_str(), *meta))
    }

    pub fn get_runtime_id(&self, name: &str, meta: u8) -> Option<u32> {
        self.by_key.get(&(name.to_string(), meta)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// (name, meta) -> Block descriptors.
#[derive(Debug, Default)]
pub struct BlockManager {
    blocks: HashMap<(String, u8), Block>,
}

impl BlockManager {
    pub fn get_block(&self, name: &str, meta: u8) -> Option<Block> {
        self.blocks.get(&(name.to_string(), meta)).cloned()
    }
}

/// Both block lookups, built together so they always agree.
#[derive(Debug)]
pub struct BlockRegistry {
    map: BlockMap,
    manager: BlockManager,
}

impl BlockRegistry {
    pub fn builder() -> BlockRegistryBuilder {
        BlockRegistryBuilder::default()
    }

    /// Registry with the stock block table.
    pub fn with_defaults() -> Self {
        let mut builder = Self::builder();
        for (name, meta) in DEFAULT_BLOCKS {
            builder = builder.register(name, *meta);
        }
        builder
            .build()
            .expect("default block table has no duplicates and starts with air")
    }

    pub fn block_map(&self) -> &BlockMap {
        &self.map
    }

    pub fn block_manager(&self) -> &BlockManager {
        &self.manager
    }

    /// Resolve a runtime id straight to its descriptor.
    pub fn resolve(&self, runtime_id: u32) -> Option<Block> {
        let (name, meta) = self.map.get_name_and_meta(runtime_id)?;
        self.manager.get_block(name, meta)
    }

    /// Look up a block by name, accepting names with or without the
    /// `minecraft:` namespace.
    pub fn by_name(&self, name: &str, meta: u8) -> Option<Block> {
        if name.contains(':') {
            self.manager.get_block(name, meta)
        } else {
            self.manager.get_block(&format!("minecraft:{}", name), meta)
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[derive(Default)]
pub struct BlockRegistryBuilder {
    entries: Vec<(String, u8)>,
}

impl BlockRegistryBuilder {
    pub fn register(mut self, name: &str, meta: u8) -> Self {
        self.entries.push((name.to_string(), meta));
        self
    }

    pub fn build(self) -> Result<BlockRegistry, RegistryError> {
        if let Some((first, _)) = self.entries.first() {
            if first != AIR_NAME {
                return Err(RegistryError::AirNotFirst(first.clone()));
            }
        }

        let mut map = BlockMap::default();
        let mut manager = BlockManager::default();

        for (name, meta) in self.entries {
            let key = (name.clone(), meta);
            if map.by_key.contains_key(&key) {
                return Err(RegistryError::Duplicate { name, meta });
            }
            let runtime_id = map.by_id.len() as u32;
            map.by_id.push(key.clone());
            map.by_key.insert(key.clone(), runtime_id);
            manager.blocks.insert(
                key,
                Block {
                    name,
                    meta,
                    runtime_id,
                },
            );
        }

        log::debug!("Block registry built with {} entries", map.len());
        Ok(BlockRegistry { map, manager })
    }
}

pub const AIR_NAME: &str = "minecraft:air";

/// Stock block table. Variants of one block type share a name and differ by meta.
pub const DEFAULT_BLOCKS: &[(&str, u8)] = &[
    (AIR_NAME, 0),
    ("minecraft:stone", 0),
    ("minecraft:stone", 1), // granite
    ("minecraft:stone", 2), // polished granite
    ("minecraft:stone", 3), // diorite
    ("minecraft:stone", 4), // polished diorite
    ("minecraft:stone", 5), // andesite
    ("minecraft:stone", 6), // polished andesite
    ("minecraft:grass", 0),
    ("minecraft:dirt", 0),
    ("minecraft:cobblestone", 0),
    ("minecraft:planks", 0),
    ("minecraft:planks", 1),
    ("minecraft:planks", 2),
    ("minecraft:planks", 3),
    ("minecraft:planks", 4),
    ("minecraft:planks", 5),
    ("minecraft:bedrock", 0),
    ("minecraft:invisible_bedrock", 0),
    ("minecraft:sand", 0),
    ("minecraft:sand", 1), // red sand
    ("minecraft:gravel", 0),
    ("minecraft:gold_ore", 0),
    ("minecraft:iron_ore", 0),
    ("minecraft:coal_ore", 0),
    ("minecraft:lapis_ore", 0),
    ("minecraft:diamond_ore", 0),
    ("minecraft:redstone_ore", 0),
    ("minecraft:emerald_ore", 0),
    ("minecraft:sponge", 0),
    ("minecraft:glass", 0),
    ("minecraft:glass_pane", 0),
    ("minecraft:sandstone", 0),
    ("minecraft:red_sandstone", 0),
    ("minecraft:wool", 0),
    ("minecraft:wool", 1),
    ("minecraft:wool", 2),
    ("minecraft:wool", 3),
    ("minecraft:wool", 4),
    ("minecraft:wool", 5),
    ("minecraft:wool", 6),
    ("minecraft:wool", 7),
    ("minecraft:wool", 8),
    ("minecraft:wool", 9),
    ("minecraft:wool", 10),
    ("minecraft:wool", 11),
    ("minecraft:wool", 12),
    ("minecraft:wool", 13),
    ("minecraft:wool", 14),
    ("minecraft:wool", 15),
    ("minecraft:gold_block", 0),
    ("minecraft:iron_block", 0),
    ("minecraft:diamond_block", 0),
    ("minecraft:emerald_block", 0),
    ("minecraft:lapis_block", 0),
    ("minecraft:redstone_block", 0),
    ("minecraft:coal_block", 0),
    ("minecraft:bookshelf", 0),
    ("minecraft:mossy_cobblestone", 0),
    ("minecraft:obsidian", 0),
    ("minecraft:glowingobsidian", 0),
    ("minecraft:mob_spawner", 0),
    ("minecraft:crafting_table", 0),
    ("minecraft:farmland", 0),
    ("minecraft:ice", 0),
    ("minecraft:packed_ice", 0),
    ("minecraft:snow", 0),
    ("minecraft:clay", 0),
    ("minecraft:hardened_clay", 0),
    ("minecraft:pumpkin", 0),
    ("minecraft:lit_pumpkin", 0),
    ("minecraft:melon_block", 0),
    ("minecraft:netherrack", 0),
    ("minecraft:soul_sand", 0),
    ("minecraft:glowstone", 0),
    ("minecraft:nether_brick", 0),
    ("minecraft:quartz_ore", 0),
    ("minecraft:quartz_block", 0),
    ("minecraft:nether_wart_block", 0),
    ("minecraft:magma", 0),
    ("minecraft:end_stone", 0),
    ("minecraft:end_bricks", 0),
    ("minecraft:purpur_block", 0),
    ("minecraft:prismarine", 0),
    ("minecraft:sea_lantern", 0),
    ("minecraft:hay_block", 0),
    ("minecraft:bone_block", 0),
    ("minecraft:mycelium", 0),
    ("minecraft:podzol", 0),
    ("minecraft:stonebrick", 0),
    ("minecraft:cactus", 0),
    ("minecraft:reeds", 0),
    ("minecraft:web", 0),
    ("minecraft:deadbush", 0),
    ("minecraft:yellow_flower", 0),
    ("minecraft:brown_mushroom", 0),
    ("minecraft:red_mushroom", 0),
    ("minecraft:tnt", 0),
    ("minecraft:noteblock", 0),
    ("minecraft:redstone_lamp", 0),
    ("minecraft:daylight_detector", 0),
    ("minecraft:enchanting_table", 0),
    ("minecraft:brewing_stand", 0),
    ("minecraft:flower_pot", 0),
    ("minecraft:iron_bars", 0),
    ("minecraft:fire", 0),
    ("minecraft:lava", 0),
    ("minecraft:water", 0),
    ("minecraft:deepslate_coal_ore", 0),
    ("minecraft:deepslate_iron_ore", 0),
    ("minecraft:deepslate_gold_ore", 0),
    ("minecraft:deepslate_lapis_ore", 0),
    ("minecraft:deepslate_redstone_ore", 0),
    ("minecraft:deepslate_diamond_ore", 0),
    ("minecraft:deepslate_emerald_ore", 0),
];
