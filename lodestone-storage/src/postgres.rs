use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use lodestone_chunk::codec::{blob_to_chunk, chunk_to_blob};
use lodestone_chunk::{Chunk, ChunkPos};
use tokio_postgres::NoTls;
use uuid::Uuid;

use crate::staged::StagedChunks;
use crate::{PlayerData, WorldMeta, WorldProvider};

/// PostgreSQL-backed world storage.
///
/// Chunks are stored as wrapped zlib NBT blobs in `BYTEA`, metadata and
/// player files as `JSONB`. Staged chunks live in process memory until
/// `save_chunk` upserts them.
pub struct PostgresProvider {
    pool: Pool,
    world: String,
    staged: StagedChunks,
}

impl PostgresProvider {
    pub async fn new(connection_string: &str, world: &str) -> Result<Self> {
        let mut cfg = Config::new();
        cfg.url = Some(connection_string.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("Failed to create Postgres pool")?;

        // Ensure connections work and schema exists
        let provider = Self {
            pool,
            world: world.to_string(),
            staged: StagedChunks::new(),
        };
        provider.init_schema().await?;

        Ok(provider)
    }

    async fn init_schema(&self) -> Result<()> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;

        client
            .batch_execute(
                "
                CREATE TABLE IF NOT EXISTS chunks (
                    world TEXT,
                    x INT,
                    z INT,
                    data BYTEA,
                    updated_at TIMESTAMP DEFAULT NOW(),
                    PRIMARY KEY (world, x, z)
                );
                CREATE TABLE IF NOT EXISTS world_meta (
                    world TEXT PRIMARY KEY,
                    data JSONB
                );
                CREATE TABLE IF NOT EXISTS players (
                    world TEXT,
                    uuid UUID,
                    data JSONB,
                    PRIMARY KEY (world, uuid)
                );
            ",
            )
            .await
            .context("Failed to init schema")?;
        Ok(())
    }
}

#[async_trait]
impl WorldProvider for PostgresProvider {
    async fn get_chunk(&self, pos: ChunkPos) -> Result<Option<Chunk>> {
        let blob = match self.staged.get(pos) {
            Some(blob) => blob.to_vec(),
            None => {
                let client = self.pool.get().await.context("Failed to get DB connection")?;
                let row = client
                    .query_opt(
                        "SELECT data FROM chunks WHERE world = $1 AND x = $2 AND z = $3",
                        &[&self.world, &pos.x, &pos.z],
                    )
                    .await
                    .with_context(|| format!("Failed to query chunk {}", pos))?;

                match row {
                    Some(row) => row.get(0),
                    None => return Ok(None),
                }
            }
        };

        let chunk = blob_to_chunk(&blob, pos)
            .with_context(|| format!("Stored chunk {} in world {} is corrupt", pos, self.world))?;
        Ok(Some(chunk))
    }

    async fn set_chunk(&self, chunk: &Chunk) -> Result<()> {
        let blob = chunk_to_blob(chunk)?;
        self.staged.insert(chunk.pos(), blob);
        Ok(())
    }

    async fn save_chunk(&self, pos: ChunkPos) -> Result<()> {
        let Some(blob) = self.staged.get(pos) else {
            log::debug!("Postgres: nothing staged for {}, skipping save", pos);
            return Ok(());
        };

        let result = async {
            let client = self.pool.get().await.context("Failed to get DB connection")?;
            client
                .execute(
                    "INSERT INTO chunks (world, x, z, data, updated_at)
                     VALUES ($1, $2, $3, $4, NOW())
                     ON CONFLICT (world, x, z) DO UPDATE SET data = $4, updated_at = NOW()",
                    &[&self.world, &pos.x, &pos.z, &*blob],
                )
                .await
                .context("Failed to insert chunk")?;
            anyhow::Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                if !self.staged.commit(pos, &blob) {
                    log::debug!("Postgres: {} was restaged during its write, keeping the newer copy", pos);
                }
                log::info!("Postgres: Write success for {}", pos);
                Ok(())
            }
            Err(e) => {
                // The blob stays staged so a later save can retry
                log::error!("Postgres: Write failed for {}: {:?}", pos, e);
                Err(e)
            }
        }
    }

    async fn load_meta(&self) -> Result<WorldMeta> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        let row = client
            .query_opt("SELECT data FROM world_meta WHERE world = $1", &[&self.world])
            .await
            .context("Failed to query world meta")?;

        match row {
            Some(row) => {
                let json_data: serde_json::Value = row.get(0);
                serde_json::from_value(json_data).context("World meta JSON is invalid")
            }
            None => {
                log::warn!("No metadata stored for world {}, using defaults", self.world);
                Ok(WorldMeta {
                    name: self.world.clone(),
                    ..WorldMeta::default()
                })
            }
        }
    }

    async fn store_meta(&self, meta: &WorldMeta) -> Result<()> {
        let json_data = serde_json::to_value(meta)?;
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        client
            .execute(
                "INSERT INTO world_meta (world, data) VALUES ($1, $2)
                 ON CONFLICT (world) DO UPDATE SET data = $2",
                &[&self.world, &json_data],
            )
            .await
            .context("Failed to store world meta")?;
        Ok(())
    }

    async fn load_player(&self, uuid: Uuid) -> Result<Option<PlayerData>> {
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        let row = client
            .query_opt(
                "SELECT data FROM players WHERE world = $1 AND uuid = $2",
                &[&self.world, &uuid],
            )
            .await
            .with_context(|| format!("Failed to query player {}", uuid))?;

        match row {
            Some(row) => {
                let json_data: serde_json::Value = row.get(0);
                let data = serde_json::from_value(json_data)
                    .with_context(|| format!("Player file for {} is invalid", uuid))?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    async fn store_player(&self, uuid: Uuid, data: &PlayerData) -> Result<()> {
        let json_data = serde_json::to_value(data)?;
        let client = self.pool.get().await.context("Failed to get DB connection")?;
        client
            .execute(
                "INSERT INTO players (world, uuid, data) VALUES ($1, $2, $3)
                 ON CONFLICT (world, uuid) DO UPDATE SET data = $3",
                &[&self.world, &uuid, &json_data],
            )
            .await
            .with_context(|| format!("Failed to store player {}", uuid))?;
        Ok(())
    }
}
