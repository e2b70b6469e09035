use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lodestone_chunk::{Block, BlockRegistry, Chunk, ChunkPos, local_coord};
use lodestone_gen::{GeneratorRegistry, WorldView};
use lodestone_metrics::WorldMetrics;
use lodestone_storage::{GameMode, SpawnPosition, WorldProvider};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::WorldConfig;
use crate::error::{BatchError, WorldError};
use crate::task::TaskGroup;
use crate::viewer::Viewer;

pub type SharedChunk = Arc<RwLock<Chunk>>;

/// Largest radius accepted by the area operations: a 2048 x 2048 chunk square.
pub const MAX_REGION_RADIUS: i32 = 1024;

/// Loaded chunks of one world plus the collaborators needed to fill and drain them.
///
/// Chunks enter the cache through [`World::load_chunk`] (storage first, generator on a
/// miss) and leave it only through [`World::unload_chunk`]. Bulk operations spawn one task
/// per chunk and always join every task before reporting.
pub struct World {
    chunks: RwLock<HashMap<ChunkPos, SharedChunk>>,
    loading: Mutex<HashSet<ChunkPos>>,
    provider: Arc<dyn WorldProvider>,
    generators: Arc<GeneratorRegistry>,
    blocks: Arc<BlockRegistry>,
    config: WorldConfig,
    metrics: Arc<WorldMetrics>,
}

/// Holds a key in the in-flight set and releases it on drop.
struct LoadGuard<'a> {
    loading: &'a Mutex<HashSet<ChunkPos>>,
    pos: ChunkPos,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.loading.lock().remove(&self.pos);
    }
}

async fn bounded<F: Future>(
    metrics: &WorldMetrics,
    limit: Duration,
    pos: Option<ChunkPos>,
    operation: &'static str,
    fut: F,
) -> Result<F::Output, WorldError> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        metrics.record_timeout();
        log::warn!("{} exceeded {:?} (chunk {:?})", operation, limit, pos);
        WorldError::Timeout { pos, operation }
    })
}

fn provider_err(pos: Option<ChunkPos>) -> impl FnOnce(anyhow::Error) -> WorldError {
    move |source| WorldError::Provider { pos, source }
}

impl World {
    pub fn new(
        provider: Arc<dyn WorldProvider>,
        generators: Arc<GeneratorRegistry>,
        blocks: Arc<BlockRegistry>,
        config: WorldConfig,
        metrics: Arc<WorldMetrics>,
    ) -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
            loading: Mutex::new(HashSet::new()),
            provider,
            generators,
            blocks,
            config,
            metrics,
        }
    }

    pub fn provider(&self) -> &Arc<dyn WorldProvider> {
        &self.provider
    }

    pub fn generators(&self) -> &GeneratorRegistry {
        &self.generators
    }

    pub fn block_registry(&self) -> &BlockRegistry {
        &self.blocks
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<WorldMetrics> {
        &self.metrics
    }

    // --- Cache queries ---

    pub fn get_chunk(&self, pos: ChunkPos) -> Option<SharedChunk> {
        self.chunks.read().get(&pos).cloned()
    }

    pub fn has_loaded_chunk(&self, pos: ChunkPos) -> bool {
        self.chunks.read().contains_key(&pos)
    }

    pub fn loaded_chunks(&self) -> Vec<ChunkPos> {
        self.chunks.read().keys().copied().collect()
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.chunks.read().len()
    }

    /// Chunk keys in the square of half-width `radius` around a world position.
    ///
    /// The range is `[center - radius, center + radius)` on both axes, so the square
    /// holds `(2 * radius)^2` keys and is offset towards negative coordinates. Radii above
    /// [`MAX_REGION_RADIUS`] are rejected.
    pub fn region_keys(x: f64, z: f64, radius: i32) -> Result<Vec<ChunkPos>, WorldError> {
        if radius > MAX_REGION_RADIUS {
            return Err(WorldError::RadiusTooLarge {
                radius,
                max: MAX_REGION_RADIUS,
            });
        }
        if radius <= 0 {
            return Ok(Vec::new());
        }
        let center = ChunkPos::from_world_f64(x, z);
        let (min_x, max_x) = (center.x.saturating_sub(radius), center.x.saturating_add(radius));
        let (min_z, max_z) = (center.z.saturating_sub(radius), center.z.saturating_add(radius));

        let side_x = (max_x as i64 - min_x as i64) as usize;
        let side_z = (max_z as i64 - min_z as i64) as usize;
        let mut keys = Vec::with_capacity(side_x * side_z);
        for cx in min_x..max_x {
            for cz in min_z..max_z {
                keys.push(ChunkPos::new(cx, cz));
            }
        }
        Ok(keys)
    }

    // --- Loading ---

    /// Claim `pos` for loading. None if it is already loading or loaded.
    fn begin_load(&self, pos: ChunkPos) -> Option<LoadGuard<'_>> {
        let mut loading = self.loading.lock();
        if loading.contains(&pos) || self.chunks.read().contains_key(&pos) {
            return None;
        }
        loading.insert(pos);
        Some(LoadGuard {
            loading: &self.loading,
            pos,
        })
    }

    /// Bring one chunk into memory, reading it from the provider or generating it.
    ///
    /// Does nothing if the chunk is cached or another caller is loading it already, so
    /// concurrent calls for one key generate it at most once. A load that fails or times
    /// out leaves the key free for a retry.
    pub async fn load_chunk(self: &Arc<Self>, pos: ChunkPos) -> Result<(), WorldError> {
        let Some(_guard) = self.begin_load(pos) else {
            log::trace!("Chunk {} already loaded or loading", pos);
            return Ok(());
        };

        let chunk = match self.fetch(pos).await? {
            Some(chunk) => chunk,
            None => self.generate(pos).await?,
        };

        self.chunks.write().insert(pos, Arc::new(RwLock::new(chunk)));
        log::debug!("Chunk {} loaded", pos);
        Ok(())
    }

    async fn fetch(&self, pos: ChunkPos) -> Result<Option<Chunk>, WorldError> {
        let start = Instant::now();
        let stored = bounded(
            &self.metrics,
            self.config.task_timeout,
            Some(pos),
            "load",
            self.provider.get_chunk(pos),
        )
        .await?
        .map_err(provider_err(Some(pos)))?;

        let Some(chunk) = stored else {
            return Ok(None);
        };
        if chunk.pos() != pos {
            log::error!("Provider returned chunk {} when asked for {}", chunk.pos(), pos);
            return Err(WorldError::Provider {
                pos: Some(pos),
                source: anyhow::anyhow!("stored data belongs to chunk {}", chunk.pos()),
            });
        }
        self.metrics.record_load(start.elapsed());
        Ok(Some(chunk))
    }

    async fn generate(self: &Arc<Self>, pos: ChunkPos) -> Result<Chunk, WorldError> {
        let name = bounded(
            &self.metrics,
            self.config.task_timeout,
            Some(pos),
            "generator lookup",
            self.provider.get_generator_name(),
        )
        .await?
        .map_err(provider_err(Some(pos)))?;
        let generator = self
            .generators
            .get_generator(&name)
            .ok_or_else(|| WorldError::UnknownGenerator(name.clone()))?;

        let start = Instant::now();
        let world = Arc::clone(self);
        // A timed out generation keeps its blocking thread until it returns; the result is dropped.
        let handle = tokio::task::spawn_blocking(move || generator.generate_chunk(pos, &*world));
        let chunk = bounded(
            &self.metrics,
            self.config.generation_timeout,
            Some(pos),
            "generate",
            handle,
        )
        .await?
        .map_err(|e| WorldError::Task(format!("generation of chunk {}: {}", pos, e)))?
        .map_err(|source| WorldError::Generation { pos, source })?;

        if chunk.pos() != pos {
            return Err(WorldError::Generation {
                pos,
                source: anyhow::anyhow!("generator {} produced chunk {}", name, chunk.pos()),
            });
        }
        self.metrics.record_generation(start.elapsed());
        log::debug!("Generated chunk {} with {} in {:?}", pos, name, start.elapsed());
        Ok(chunk)
    }

    /// Load every chunk in [`World::region_keys`] concurrently.
    ///
    /// All tasks run to completion even when some fail; the failures are then returned
    /// together as a [`BatchError`]. Chunks that did load stay loaded.
    pub async fn load_radius(self: &Arc<Self>, x: f64, z: f64, radius: i32) -> Result<(), WorldError> {
        self.load_keys(Self::region_keys(x, z, radius)?).await.map(|_| ())
    }

    async fn load_keys(self: &Arc<Self>, keys: Vec<ChunkPos>) -> Result<usize, WorldError> {
        let mut tasks = TaskGroup::new();
        for pos in keys {
            if self.has_loaded_chunk(pos) {
                self.metrics.record_cache_hit();
                continue;
            }
            self.metrics.record_cache_miss();
            let world = Arc::clone(self);
            tasks.spawn(async move { world.load_chunk(pos).await });
        }
        log::debug!("Loading {} chunks", tasks.len());
        tasks.join_all(Some(&self.metrics)).await
    }

    // --- Streaming ---

    /// Load the area around a position, then stream it to `viewer`.
    ///
    /// Every load finishes before the first send starts, and every send finishes before
    /// the single publisher update. The update is sent even when loads or sends failed;
    /// those failures are returned afterwards. An oversized radius is rejected before
    /// anything is loaded or sent.
    pub async fn send_radius(
        self: &Arc<Self>,
        x: f64,
        z: f64,
        radius: i32,
        viewer: Arc<dyn Viewer>,
    ) -> Result<(), WorldError> {
        let keys = Self::region_keys(x, z, radius)?;
        let loaded = self.load_keys(keys.clone()).await;

        let mut tasks = TaskGroup::new();
        for pos in keys {
            let Some(chunk) = self.get_chunk(pos) else {
                continue;
            };
            let viewer = Arc::clone(&viewer);
            let metrics = Arc::clone(&self.metrics);
            let limit = self.config.task_timeout;
            tasks.spawn(async move {
                let snapshot = chunk.read().clone();
                let start = Instant::now();
                bounded(&metrics, limit, Some(pos), "send", viewer.send_chunk(&snapshot))
                    .await?
                    .map_err(|source| WorldError::Viewer {
                        pos: Some(pos),
                        source,
                    })?;
                metrics.record_send(start.elapsed());
                Ok(())
            });
        }
        let sent = tasks.join_all(Some(&self.metrics)).await;

        let published = bounded(
            &self.metrics,
            self.config.task_timeout,
            None,
            "publisher update",
            viewer.send_network_chunk_publisher_update(),
        )
        .await
        .and_then(|r| r.map_err(|source| WorldError::Viewer { pos: None, source }))
        .map(|()| 0);

        BatchError::collect(vec![loaded, sent, published]).map(|_| ())
    }

    // --- Writing back ---

    async fn sync(&self, pos: ChunkPos, chunk: &SharedChunk) -> Result<(), WorldError> {
        sync_chunk(&self.provider, &self.metrics, self.config.task_timeout, pos, chunk).await
    }

    async fn persist(&self, pos: ChunkPos) -> Result<(), WorldError> {
        persist_chunk(&self.provider, &self.metrics, self.config.task_timeout, pos).await
    }

    /// Write a chunk back to the provider and drop it from memory.
    ///
    /// The chunk is only evicted once the provider accepted and persisted it; on failure
    /// it stays loaded.
    pub async fn unload_chunk(&self, pos: ChunkPos) -> Result<(), WorldError> {
        let chunk = self.get_chunk(pos).ok_or(WorldError::ChunkNotLoaded(pos))?;
        self.sync(pos, &chunk).await?;
        self.persist(pos).await?;
        self.chunks.write().remove(&pos);
        log::debug!("Chunk {} unloaded", pos);
        Ok(())
    }

    /// Push the current contents of one loaded chunk to the provider.
    pub async fn save_chunk(&self, pos: ChunkPos) -> Result<(), WorldError> {
        let chunk = self.get_chunk(pos).ok_or(WorldError::ChunkNotLoaded(pos))?;
        self.sync(pos, &chunk).await
    }

    /// Push every loaded chunk to the provider.
    ///
    /// This refreshes what the provider holds; it neither evicts nor asks the provider to
    /// persist. Use [`World::flush`] for that.
    pub async fn save(self: &Arc<Self>) -> Result<(), WorldError> {
        let entries: Vec<(ChunkPos, SharedChunk)> = self
            .chunks
            .read()
            .iter()
            .map(|(pos, chunk)| (*pos, Arc::clone(chunk)))
            .collect();

        let mut tasks = TaskGroup::new();
        for (pos, chunk) in entries {
            let provider = Arc::clone(&self.provider);
            let metrics = Arc::clone(&self.metrics);
            let limit = self.config.task_timeout;
            tasks.spawn(async move { sync_chunk(&provider, &metrics, limit, pos, &chunk).await });
        }
        let saved = tasks.join_all(Some(&self.metrics)).await?;
        log::info!("Saved {} chunks", saved);
        Ok(())
    }

    /// [`World::save`] followed by a durable persist of every loaded chunk.
    pub async fn flush(self: &Arc<Self>) -> Result<(), WorldError> {
        let saved = self.save().await.map(|()| 0);

        let mut tasks = TaskGroup::new();
        for pos in self.loaded_chunks() {
            let provider = Arc::clone(&self.provider);
            let metrics = Arc::clone(&self.metrics);
            let limit = self.config.task_timeout;
            tasks.spawn(async move { persist_chunk(&provider, &metrics, limit, pos).await });
        }
        let persisted = tasks.join_all(Some(&self.metrics)).await;
        if let Ok(count) = &persisted {
            log::info!("Persisted {} chunks", count);
        }

        BatchError::collect(vec![saved, persisted]).map(|_| ())
    }

    // --- Blocks ---

    fn loaded_chunk_at(&self, x: i32, z: i32) -> Result<SharedChunk, WorldError> {
        let pos = ChunkPos::from_world(x, z);
        self.get_chunk(pos).ok_or(WorldError::ChunkNotLoaded(pos))
    }

    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Result<Block, WorldError> {
        let chunk = self.loaded_chunk_at(x, z)?;
        let id = chunk.read().get_block_runtime_id(local_coord(x), y, local_coord(z));

        let (name, meta) = self
            .blocks
            .block_map()
            .get_name_and_meta(id)
            .ok_or(WorldError::UnknownBlock(id))?;
        self.blocks
            .block_manager()
            .get_block(name, meta)
            .ok_or(WorldError::UnknownBlock(id))
    }

    pub fn set_block(&self, x: i32, y: i32, z: i32, block: &Block) -> Result<(), WorldError> {
        if self.blocks.block_map().get_name_and_meta(block.runtime_id).is_none() {
            return Err(WorldError::UnknownBlock(block.runtime_id));
        }
        let chunk = self.loaded_chunk_at(x, z)?;
        chunk
            .write()
            .set_block_runtime_id(local_coord(x), y, local_coord(z), block.runtime_id);
        Ok(())
    }

    /// Y of the topmost non-air block in the column, or None for an all-air column.
    pub fn get_highest_block_at(&self, x: i32, z: i32) -> Result<Option<i32>, WorldError> {
        let chunk = self.loaded_chunk_at(x, z)?;
        let height = chunk.read().get_highest_block_at(local_coord(x), local_coord(z));
        Ok(height)
    }

    // --- World metadata ---

    pub async fn get_world_name(&self) -> Result<String, WorldError> {
        self.provider.get_world_name().await.map_err(provider_err(None))
    }

    pub async fn set_world_name(&self, name: &str) -> Result<(), WorldError> {
        self.provider.set_world_name(name).await.map_err(provider_err(None))
    }

    pub async fn get_spawn_position(&self) -> Result<SpawnPosition, WorldError> {
        self.provider.get_spawn_position().await.map_err(provider_err(None))
    }

    pub async fn set_spawn_position(&self, spawn: SpawnPosition) -> Result<(), WorldError> {
        self.provider.set_spawn_position(spawn).await.map_err(provider_err(None))
    }

    pub async fn get_world_gamemode(&self) -> Result<GameMode, WorldError> {
        self.provider.get_world_gamemode().await.map_err(provider_err(None))
    }

    pub async fn set_world_gamemode(&self, gamemode: GameMode) -> Result<(), WorldError> {
        self.provider.set_world_gamemode(gamemode).await.map_err(provider_err(None))
    }

    pub async fn get_generator_name(&self) -> Result<String, WorldError> {
        self.provider.get_generator_name().await.map_err(provider_err(None))
    }

    /// Switch the generator used for chunks that have no stored data yet.
    pub async fn set_generator_name(&self, name: &str) -> Result<(), WorldError> {
        if self.generators.get_generator(name).is_none() {
            return Err(WorldError::UnknownGenerator(name.to_string()));
        }
        self.provider.set_generator_name(name).await.map_err(provider_err(None))
    }

    // --- Player metadata ---

    pub async fn get_player_position(&self, uuid: Uuid) -> Result<SpawnPosition, WorldError> {
        self.provider.get_player_position(uuid).await.map_err(provider_err(None))
    }

    pub async fn set_player_position(&self, uuid: Uuid, position: SpawnPosition) -> Result<(), WorldError> {
        self.provider
            .set_player_position(uuid, position)
            .await
            .map_err(provider_err(None))
    }

    pub async fn get_player_gamemode(&self, uuid: Uuid) -> Result<GameMode, WorldError> {
        self.provider.get_player_gamemode(uuid).await.map_err(provider_err(None))
    }

    pub async fn set_player_gamemode(&self, uuid: Uuid, gamemode: GameMode) -> Result<(), WorldError> {
        self.provider
            .set_player_gamemode(uuid, gamemode)
            .await
            .map_err(provider_err(None))
    }

    pub async fn has_player(&self, uuid: Uuid) -> Result<bool, WorldError> {
        self.provider.has_player_file(uuid).await.map_err(provider_err(None))
    }

    /// Create the player's file with world defaults. An existing file is left alone.
    pub async fn create_player(&self, uuid: Uuid) -> Result<(), WorldError> {
        self.provider.create_player_file(uuid).await.map_err(provider_err(None))
    }
}

async fn sync_chunk(
    provider: &Arc<dyn WorldProvider>,
    metrics: &WorldMetrics,
    limit: Duration,
    pos: ChunkPos,
    chunk: &SharedChunk,
) -> Result<(), WorldError> {
    let snapshot = chunk.read().clone();
    let start = Instant::now();
    bounded(metrics, limit, Some(pos), "save", provider.set_chunk(&snapshot))
        .await?
        .map_err(provider_err(Some(pos)))?;
    metrics.record_sync(start.elapsed());
    Ok(())
}

async fn persist_chunk(
    provider: &Arc<dyn WorldProvider>,
    metrics: &WorldMetrics,
    limit: Duration,
    pos: ChunkPos,
) -> Result<(), WorldError> {
    let start = Instant::now();
    bounded(metrics, limit, Some(pos), "persist", provider.save_chunk(pos))
        .await?
        .map_err(provider_err(Some(pos)))?;
    metrics.record_persist(start.elapsed());
    Ok(())
}

impl WorldView for World {
    fn is_chunk_loaded(&self, pos: ChunkPos) -> bool {
        self.has_loaded_chunk(pos)
    }

    fn block_runtime_id_at(&self, x: i32, y: i32, z: i32) -> Option<u32> {
        let chunk = self.get_chunk(ChunkPos::from_world(x, z))?;
        let id = chunk.read().get_block_runtime_id(local_coord(x), y, local_coord(z));
        Some(id)
    }

    fn blocks(&self) -> &BlockRegistry {
        &self.blocks
    }
}
