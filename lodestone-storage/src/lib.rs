use anyhow::Result;
use async_trait::async_trait;
use lodestone_chunk::{Chunk, ChunkPos};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod meta;
pub mod postgres;
mod staged;

pub use memory::MemoryProvider;
pub use meta::{GameMode, PlayerData, SpawnPosition, WorldMeta};
pub use postgres::PostgresProvider;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("no player file for {0}")]
    PlayerNotFound(Uuid),

    #[error("invalid gamemode id {0}")]
    InvalidGameMode(i32),
}

/// Durable storage for one world: chunks, world settings and player files.
///
/// Chunk writes are two-phase:
/// - `set_chunk` refreshes the provider's staged copy of a chunk. Cheap, not durable.
/// - `save_chunk` persists whatever is staged for a position to the backing medium.
#[async_trait]
pub trait WorldProvider: Send + Sync {
    /// Load a chunk. Staged copies win over persisted ones.
    /// Returns None if the chunk has never been stored.
    async fn get_chunk(&self, pos: ChunkPos) -> Result<Option<Chunk>>;

    /// Replace the staged copy of a chunk.
    async fn set_chunk(&self, chunk: &Chunk) -> Result<()>;

    /// Persist the staged copy of a chunk. A no-op if nothing is staged.
    async fn save_chunk(&self, pos: ChunkPos) -> Result<()>;

    async fn load_meta(&self) -> Result<WorldMeta>;
    async fn store_meta(&self, meta: &WorldMeta) -> Result<()>;

    async fn load_player(&self, uuid: Uuid) -> Result<Option<PlayerData>>;
    async fn store_player(&self, uuid: Uuid, data: &PlayerData) -> Result<()>;

    async fn get_world_name(&self) -> Result<String> {
        Ok(self.load_meta().await?.name)
    }

    async fn set_world_name(&self, name: &str) -> Result<()> {
        let mut meta = self.load_meta().await?;
        meta.name = name.to_string();
        self.store_meta(&meta).await
    }

    async fn get_spawn_position(&self) -> Result<SpawnPosition> {
        Ok(self.load_meta().await?.spawn)
    }

    async fn set_spawn_position(&self, spawn: SpawnPosition) -> Result<()> {
        let mut meta = self.load_meta().await?;
        meta.spawn = spawn;
        self.store_meta(&meta).await
    }

    async fn get_world_gamemode(&self) -> Result<GameMode> {
        Ok(self.load_meta().await?.gamemode)
    }

    async fn set_world_gamemode(&self, gamemode: GameMode) -> Result<()> {
        let mut meta = self.load_meta().await?;
        meta.gamemode = gamemode;
        self.store_meta(&meta).await
    }

    async fn get_generator_name(&self) -> Result<String> {
        Ok(self.load_meta().await?.generator)
    }

    async fn set_generator_name(&self, generator: &str) -> Result<()> {
        let mut meta = self.load_meta().await?;
        meta.generator = generator.to_string();
        self.store_meta(&meta).await
    }

    async fn get_player_position(&self, uuid: Uuid) -> Result<SpawnPosition> {
        Ok(self.require_player(uuid).await?.position)
    }

    async fn set_player_position(&self, uuid: Uuid, position: SpawnPosition) -> Result<()> {
        let mut data = self.require_player(uuid).await?;
        data.position = position;
        self.store_player(uuid, &data).await
    }

    async fn get_player_gamemode(&self, uuid: Uuid) -> Result<GameMode> {
        Ok(self.require_player(uuid).await?.gamemode)
    }

    async fn set_player_gamemode(&self, uuid: Uuid, gamemode: GameMode) -> Result<()> {
        let mut data = self.require_player(uuid).await?;
        data.gamemode = gamemode;
        self.store_player(uuid, &data).await
    }

    async fn has_player_file(&self, uuid: Uuid) -> Result<bool> {
        Ok(self.load_player(uuid).await?.is_some())
    }

    /// Create a player file at the world spawn with the world gamemode.
    /// Leaves an existing file untouched.
    async fn create_player_file(&self, uuid: Uuid) -> Result<()> {
        if self.has_player_file(uuid).await? {
            log::debug!("Player file for {} already exists", uuid);
            return Ok(());
        }
        let meta = self.load_meta().await?;
        let data = PlayerData {
            position: meta.spawn,
            gamemode: meta.gamemode,
        };
        log::info!("Creating player file for {}", uuid);
        self.store_player(uuid, &data).await
    }

    async fn require_player(&self, uuid: Uuid) -> Result<PlayerData> {
        match self.load_player(uuid).await? {
            Some(data) => Ok(data),
            None => Err(StorageError::PlayerNotFound(uuid).into()),
        }
    }
}
