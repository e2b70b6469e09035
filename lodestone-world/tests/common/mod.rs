#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use lodestone_chunk::{BlockRegistry, Chunk, ChunkPos};
use lodestone_gen::flat::FlatGenerator;
use lodestone_gen::{GeneratorRegistry, WorldGenerator, WorldView};
use lodestone_metrics::WorldMetrics;
use lodestone_storage::{MemoryProvider, PlayerData, WorldMeta, WorldProvider};
use lodestone_world::{Viewer, World, WorldConfig};
use parking_lot::Mutex;
use uuid::Uuid;

/// Flat generator that counts its calls and takes a little while per chunk.
pub struct CountingGenerator {
    inner: FlatGenerator,
    pub calls: AtomicUsize,
    delay: Duration,
}

impl CountingGenerator {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: FlatGenerator::default(),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WorldGenerator for CountingGenerator {
    fn name(&self) -> &str {
        "flat"
    }

    fn generate_chunk(&self, pos: ChunkPos, world: &dyn WorldView) -> Result<Chunk> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.generate_chunk(pos, world)
    }
}

pub fn test_config() -> WorldConfig {
    WorldConfig {
        task_timeout: Duration::from_secs(5),
        generation_timeout: Duration::from_secs(5),
    }
}

pub fn build_world(
    provider: Arc<dyn WorldProvider>,
    generator: Arc<CountingGenerator>,
    config: WorldConfig,
) -> Arc<World> {
    let mut generators = GeneratorRegistry::with_defaults();
    generators.register(generator);
    Arc::new(World::new(
        provider,
        Arc::new(generators),
        Arc::new(BlockRegistry::with_defaults()),
        config,
        Arc::new(WorldMetrics::new()),
    ))
}

/// World over a fresh memory provider; returns the provider for inspection.
pub fn memory_world() -> (Arc<World>, Arc<MemoryProvider>, Arc<CountingGenerator>) {
    let provider = Arc::new(MemoryProvider::new());
    let generator = CountingGenerator::new(Duration::ZERO);
    let world = build_world(provider.clone(), generator.clone(), test_config());
    (world, provider, generator)
}

pub fn sorted(mut keys: Vec<ChunkPos>) -> Vec<ChunkPos> {
    keys.sort();
    keys
}

/// Memory provider that fails chunk reads for chosen keys a limited number of times,
/// and can hang forever on reads.
pub struct FlakyProvider {
    pub inner: MemoryProvider,
    failing: Mutex<HashSet<ChunkPos>>,
    failures_left: AtomicUsize,
    hang: bool,
}

impl FlakyProvider {
    pub fn failing(keys: &[ChunkPos], times: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryProvider::new(),
            failing: Mutex::new(keys.iter().copied().collect()),
            failures_left: AtomicUsize::new(times),
            hang: false,
        })
    }

    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryProvider::new(),
            failing: Mutex::new(HashSet::new()),
            failures_left: AtomicUsize::new(0),
            hang: true,
        })
    }
}

#[async_trait]
impl WorldProvider for FlakyProvider {
    async fn get_chunk(&self, pos: ChunkPos) -> Result<Option<Chunk>> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.failing.lock().contains(&pos) {
            let left = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if left.is_ok() {
                anyhow::bail!("disk on fire while reading {}", pos);
            }
        }
        self.inner.get_chunk(pos).await
    }

    async fn set_chunk(&self, chunk: &Chunk) -> Result<()> {
        self.inner.set_chunk(chunk).await
    }

    async fn save_chunk(&self, pos: ChunkPos) -> Result<()> {
        if self.failing.lock().contains(&pos) {
            anyhow::bail!("disk on fire while saving {}", pos);
        }
        self.inner.save_chunk(pos).await
    }

    async fn load_meta(&self) -> Result<WorldMeta> {
        self.inner.load_meta().await
    }

    async fn store_meta(&self, meta: &WorldMeta) -> Result<()> {
        self.inner.store_meta(meta).await
    }

    async fn load_player(&self, uuid: Uuid) -> Result<Option<PlayerData>> {
        self.inner.load_player(uuid).await
    }

    async fn store_player(&self, uuid: Uuid, data: &PlayerData) -> Result<()> {
        self.inner.store_player(uuid, data).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    Chunk(ChunkPos),
    PublisherUpdate,
}

/// Viewer that records what it receives and how many chunks were loaded at each send.
pub struct RecordingViewer {
    world: Arc<World>,
    pub events: Mutex<Vec<ViewerEvent>>,
    pub loaded_at_send: Mutex<Vec<usize>>,
    reject: Option<ChunkPos>,
}

impl RecordingViewer {
    pub fn new(world: &Arc<World>) -> Arc<Self> {
        Self::rejecting(world, None)
    }

    pub fn rejecting(world: &Arc<World>, reject: Option<ChunkPos>) -> Arc<Self> {
        Arc::new(Self {
            world: Arc::clone(world),
            events: Mutex::new(Vec::new()),
            loaded_at_send: Mutex::new(Vec::new()),
            reject,
        })
    }

    pub fn events(&self) -> Vec<ViewerEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Viewer for RecordingViewer {
    async fn send_chunk(&self, chunk: &Chunk) -> Result<()> {
        tokio::task::yield_now().await;
        if self.reject == Some(chunk.pos()) {
            anyhow::bail!("connection reset");
        }
        self.loaded_at_send.lock().push(self.world.loaded_chunk_count());
        self.events.lock().push(ViewerEvent::Chunk(chunk.pos()));
        Ok(())
    }

    async fn send_network_chunk_publisher_update(&self) -> Result<()> {
        self.events.lock().push(ViewerEvent::PublisherUpdate);
        Ok(())
    }
}
