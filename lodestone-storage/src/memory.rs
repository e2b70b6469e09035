//! In-memory provider using HashMaps.
//!
//! Useful for development and testing. Data is lost on restart. Chunks are
//! kept as encoded blobs so every write goes through the real chunk format.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lodestone_chunk::codec::{blob_to_chunk, chunk_to_blob};
use lodestone_chunk::{Chunk, ChunkPos};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{PlayerData, WorldMeta, WorldProvider};

/// In-memory world storage.
///
/// Holds two chunk maps to mirror a real backend: `staged` is what
/// `set_chunk` writes, `persisted` is what `save_chunk` commits.
pub struct MemoryProvider {
    staged: RwLock<HashMap<ChunkPos, Vec<u8>>>,
    persisted: RwLock<HashMap<ChunkPos, Vec<u8>>>,
    meta: RwLock<WorldMeta>,
    players: RwLock<HashMap<Uuid, PlayerData>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::with_meta(WorldMeta::default())
    }

    pub fn with_meta(meta: WorldMeta) -> Self {
        Self {
            staged: RwLock::new(HashMap::new()),
            persisted: RwLock::new(HashMap::new()),
            meta: RwLock::new(meta),
            players: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a chunk as if it had been saved in an earlier session.
    pub fn with_chunk(self, chunk: &Chunk) -> Result<Self> {
        let blob = chunk_to_blob(chunk)?;
        self.persisted.write().insert(chunk.pos(), blob);
        Ok(self)
    }

    pub fn is_staged(&self, pos: ChunkPos) -> bool {
        self.staged.read().contains_key(&pos)
    }

    pub fn is_persisted(&self, pos: ChunkPos) -> bool {
        self.persisted.read().contains_key(&pos)
    }

    pub fn staged_chunks(&self) -> Vec<ChunkPos> {
        self.staged.read().keys().copied().collect()
    }

    pub fn persisted_chunks(&self) -> Vec<ChunkPos> {
        self.persisted.read().keys().copied().collect()
    }

    /// Decode the durable copy of a chunk, ignoring anything staged.
    pub fn persisted_chunk(&self, pos: ChunkPos) -> Result<Option<Chunk>> {
        let blob = self.persisted.read().get(&pos).cloned();
        blob.map(|blob| blob_to_chunk(&blob, pos)).transpose()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorldProvider for MemoryProvider {
    async fn get_chunk(&self, pos: ChunkPos) -> Result<Option<Chunk>> {
        let blob = {
            let staged = self.staged.read();
            match staged.get(&pos) {
                Some(blob) => Some(blob.clone()),
                None => self.persisted.read().get(&pos).cloned(),
            }
        };

        match blob {
            Some(blob) => {
                let chunk = blob_to_chunk(&blob, pos)
                    .with_context(|| format!("Stored chunk {} is corrupt", pos))?;
                Ok(Some(chunk))
            }
            None => Ok(None),
        }
    }

    async fn set_chunk(&self, chunk: &Chunk) -> Result<()> {
        let blob = chunk_to_blob(chunk)?;
        self.staged.write().insert(chunk.pos(), blob);
        Ok(())
    }

    async fn save_chunk(&self, pos: ChunkPos) -> Result<()> {
        let Some(blob) = self.staged.write().remove(&pos) else {
            log::debug!("MemoryProvider: nothing staged for {}, skipping save", pos);
            return Ok(());
        };
        self.persisted.write().insert(pos, blob);
        log::debug!("MemoryProvider: persisted chunk {}", pos);
        Ok(())
    }

    async fn load_meta(&self) -> Result<WorldMeta> {
        Ok(self.meta.read().clone())
    }

    async fn store_meta(&self, meta: &WorldMeta) -> Result<()> {
        *self.meta.write() = meta.clone();
        Ok(())
    }

    async fn load_player(&self, uuid: Uuid) -> Result<Option<PlayerData>> {
        Ok(self.players.read().get(&uuid).cloned())
    }

    async fn store_player(&self, uuid: Uuid, data: &PlayerData) -> Result<()> {
        self.players.write().insert(uuid, data.clone());
        Ok(())
    }
}
