use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use lodestone_chunk::{BlockRegistry, Chunk, ChunkPos};

pub mod builder;
pub mod flat;
pub mod void;

/// Read-only access to the world a chunk is generated into.
///
/// Generators may look at neighbouring chunks that are already loaded, for
/// example to continue a structure across a border.
pub trait WorldView: Send + Sync {
    fn is_chunk_loaded(&self, pos: ChunkPos) -> bool;

    /// Runtime id at world coordinates, or None if the owning chunk is not loaded.
    fn block_runtime_id_at(&self, x: i32, y: i32, z: i32) -> Option<u32>;

    fn blocks(&self) -> &BlockRegistry;
}

pub trait WorldGenerator: Send + Sync {
    /// Name the generator is registered under.
    fn name(&self) -> &str;

    /// Produce a brand new chunk for a position that has no stored data.
    /// Called from a blocking thread, so it may be CPU heavy.
    fn generate_chunk(&self, pos: ChunkPos, world: &dyn WorldView) -> Result<Chunk>;
}

/// Generators available to worlds, keyed by name.
#[derive(Default, Clone)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Arc<dyn WorldGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the stock `flat` and `void` generators.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(flat::FlatGenerator::default()));
        registry.register(Arc::new(void::VoidGenerator));
        registry
    }

    /// Add a generator, replacing any previous one with the same name.
    pub fn register(&mut self, generator: Arc<dyn WorldGenerator>) {
        let name = generator.name().to_string();
        if self.generators.insert(name.clone(), generator).is_some() {
            log::warn!("Generator {} registered twice, keeping the latest", name);
        }
    }

    pub fn get_generator(&self, name: &str) -> Option<Arc<dyn WorldGenerator>> {
        self.generators.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.generators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// A view of a world with nothing loaded, for generator tests.
#[cfg(test)]
pub(crate) struct EmptyView(pub BlockRegistry);

#[cfg(test)]
impl WorldView for EmptyView {
    fn is_chunk_loaded(&self, _pos: ChunkPos) -> bool {
        false
    }

    fn block_runtime_id_at(&self, _x: i32, _y: i32, _z: i32) -> Option<u32> {
        None
    }

    fn blocks(&self) -> &BlockRegistry {
        &self.0
    }
}
