use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use lodestone_chunk::BlockRegistry;
use lodestone_gen::GeneratorRegistry;
use lodestone_gen::flat::FlatGenerator;
use lodestone_metrics::WorldMetrics;
use lodestone_storage::{MemoryProvider, PostgresProvider, WorldProvider};
use lodestone_world::{World, WorldConfig};

#[derive(Parser)]
#[command(name = "lodestone", about = "Chunk cache and world storage core for a Minecraft server")]
pub struct Args {
    /// Generator for chunks with no stored data: "flat" or "void"
    #[arg(short, long, env = "GENERATOR")]
    pub generator: Option<String>,

    /// Layers for the flat generator, e.g. "bedrock,3*stone,2*dirt,grass"
    #[arg(long, env = "FLAT_PRESET")]
    pub flat_preset: Option<String>,

    /// Storage mode: "memory" (lost on exit) or "postgres"
    #[arg(long, env = "STORAGE", default_value = "memory")]
    pub storage: String,

    #[arg(long, env = "DATABASE_URL", default_value = "postgres://postgres:postgres@db:5432/lodestone")]
    pub database_url: String,

    #[arg(short, long, env = "WORLD_NAME", default_value = "world")]
    pub world: String,

    /// Chunk radius loaded around spawn on startup
    #[arg(long, env = "VIEW_RADIUS", default_value = "8")]
    pub view_radius: i32,

    #[arg(long, env = "TASK_TIMEOUT_MS", default_value = "30000")]
    pub task_timeout_ms: u64,

    /// Upper bound for generating a single chunk
    #[arg(long, env = "GENERATION_TIMEOUT_MS", default_value = "60000")]
    pub generation_timeout_ms: u64,

    /// Print a metrics report on shutdown
    #[arg(long, env = "BENCHMARK")]
    pub benchmark: bool,
}

impl Args {
    fn world_config(&self) -> WorldConfig {
        WorldConfig {
            task_timeout: Duration::from_millis(self.task_timeout_ms),
            generation_timeout: Duration::from_millis(self.generation_timeout_ms),
        }
    }
}

async fn connect_postgres(url: &str, world: &str) -> anyhow::Result<PostgresProvider> {
    let mut last_err = None;
    for i in 0..30 {
        match PostgresProvider::new(url, world).await {
            Ok(provider) => return Ok(provider),
            Err(e) => {
                log::warn!("Failed to connect to storage: {}. Retrying {}/30 in 2s...", e, i + 1);
                last_err = Some(e);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no connection attempt made")))
        .context("Could not connect to storage after 30 retries")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let provider: Arc<dyn WorldProvider> = match args.storage.to_lowercase().as_str() {
        "postgres" | "raw" => {
            log::info!("Storage mode: PostgreSQL at {}", args.database_url);
            Arc::new(connect_postgres(&args.database_url, &args.world).await?)
        }
        "memory" => {
            log::info!("Storage mode: memory (nothing survives a restart)");
            Arc::new(MemoryProvider::new())
        }
        other => anyhow::bail!("Unknown storage mode '{}'", other),
    };

    let mut generators = GeneratorRegistry::with_defaults();
    if let Some(preset) = &args.flat_preset {
        generators.register(Arc::new(FlatGenerator::from_preset(preset)?));
    }
    if let Some(name) = &args.generator {
        if generators.get_generator(name).is_none() {
            anyhow::bail!("Unknown generator '{}', available: {:?}", name, generators.names());
        }
        provider.set_generator_name(name).await?;
    }

    let metrics = Arc::new(WorldMetrics::new());
    let config = args.world_config();
    let world = Arc::new(World::new(
        provider,
        Arc::new(generators),
        Arc::new(BlockRegistry::with_defaults()),
        config,
        metrics.clone(),
    ));

    let name = world.get_world_name().await?;
    let spawn = world.get_spawn_position().await?;
    log::info!(
        "Loading world '{}' (generator {}) around spawn ({}, {}, {})",
        name,
        world.get_generator_name().await?,
        spawn.x,
        spawn.y,
        spawn.z
    );

    if let Err(e) = world.load_radius(spawn.x, spawn.z, args.view_radius).await {
        log::error!("Spawn area only partially loaded: {}", e);
        for failure in e.into_failures() {
            log::error!("  {:?}", failure);
        }
    }
    log::info!("{} chunks ready. Press Ctrl+C to stop", world.loaded_chunk_count());

    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C signal handler")?;

    log::info!("Shutting down, saving {} chunks", world.loaded_chunk_count());
    let flushed = world.flush().await;

    if args.benchmark {
        println!("{}", metrics.generate_report());
    }

    flushed.context("Failed to save world on shutdown")?;
    Ok(())
}
