mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use lodestone_chunk::{BlockRegistry, Chunk, ChunkPos};
use lodestone_gen::WorldView;
use lodestone_storage::{MemoryProvider, WorldMeta};
use lodestone_world::{WorldConfig, WorldError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_generate_once() {
    let provider = Arc::new(MemoryProvider::new());
    let generator = CountingGenerator::new(Duration::from_millis(30));
    let world = build_world(provider, generator.clone(), test_config());
    let pos = ChunkPos::new(7, -3);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let world = Arc::clone(&world);
        handles.push(tokio::spawn(async move { world.load_chunk(pos).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(generator.calls(), 1);
    assert_eq!(world.loaded_chunks(), vec![pos]);
}

#[tokio::test]
async fn test_load_of_cached_chunk_is_noop() {
    let (world, _, generator) = memory_world();
    let pos = ChunkPos::new(0, 0);

    world.load_chunk(pos).await.unwrap();
    world.load_chunk(pos).await.unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(world.loaded_chunk_count(), 1);
}

#[tokio::test]
async fn test_load_radius_one_loads_four_chunks() {
    let (world, _, generator) = memory_world();

    world.load_radius(0.0, 0.0, 1).await.unwrap();

    assert_eq!(
        sorted(world.loaded_chunks()),
        vec![
            ChunkPos::new(-1, -1),
            ChunkPos::new(-1, 0),
            ChunkPos::new(0, -1),
            ChunkPos::new(0, 0),
        ]
    );
    assert_eq!(generator.calls(), 4);
}

#[tokio::test]
async fn test_overlapping_radius_loads_only_missing_chunks() {
    let (world, _, generator) = memory_world();

    world.load_radius(0.0, 0.0, 2).await.unwrap();
    assert_eq!(generator.calls(), 16);

    // Shifted one chunk east: 4 new columns of chunks
    world.load_radius(16.0, 0.0, 2).await.unwrap();
    assert_eq!(generator.calls(), 20);
    assert_eq!(world.loaded_chunk_count(), 20);
}

#[tokio::test]
async fn test_flat_chunk_generated_once_and_readable() {
    let (world, _, generator) = memory_world();
    let pos = ChunkPos::new(2, 2);

    world.load_chunk(pos).await.unwrap();

    assert_eq!(generator.calls(), 1);
    assert!(world.has_loaded_chunk(pos));
    assert_eq!(world.get_block(32, 0, 32).unwrap().name, "minecraft:bedrock");
    assert_eq!(world.get_block(47, 6, 47).unwrap().name, "minecraft:grass");
    assert!(world.get_block(40, 7, 40).unwrap().is_air());
    assert_eq!(world.get_highest_block_at(40, 45).unwrap(), Some(6));
}

#[tokio::test]
async fn test_stored_chunk_is_not_regenerated() {
    let blocks = BlockRegistry::with_defaults();
    let gold = blocks.by_name("gold_block", 0).unwrap();
    let mut chunk = Chunk::new(ChunkPos::new(-2, 5));
    chunk.set_block_runtime_id(3, 100, 4, gold.runtime_id);

    let provider = Arc::new(MemoryProvider::new().with_chunk(&chunk).unwrap());
    let generator = CountingGenerator::new(Duration::ZERO);
    let world = build_world(provider, generator.clone(), test_config());

    world.load_chunk(ChunkPos::new(-2, 5)).await.unwrap();

    assert_eq!(generator.calls(), 0);
    assert_eq!(world.get_block(-32 + 3, 100, 80 + 4).unwrap(), gold);
    assert_eq!(world.metrics().chunks_loaded(), 1);
}

#[tokio::test]
async fn test_failed_load_can_be_retried() {
    let pos = ChunkPos::new(1, 1);
    let provider = FlakyProvider::failing(&[pos], 1);
    let world = build_world(provider, CountingGenerator::new(Duration::ZERO), test_config());

    let err = world.load_chunk(pos).await.unwrap_err();
    assert!(matches!(err, WorldError::Provider { pos: Some(p), .. } if p == pos));
    assert!(!world.has_loaded_chunk(pos));

    world.load_chunk(pos).await.unwrap();
    assert!(world.has_loaded_chunk(pos));
}

#[tokio::test]
async fn test_load_radius_collects_failures_and_keeps_successes() {
    let bad = ChunkPos::new(-1, 0);
    let provider = FlakyProvider::failing(&[bad], usize::MAX);
    let world = build_world(provider, CountingGenerator::new(Duration::ZERO), test_config());

    let err = world.load_radius(0.0, 0.0, 1).await.unwrap_err();

    let WorldError::Batch(batch) = err else {
        panic!("Expected a batch error, got {:?}", err);
    };
    assert_eq!(batch.succeeded, 3);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(world.loaded_chunk_count(), 3);
    assert!(!world.has_loaded_chunk(bad));
    assert_eq!(world.metrics().task_failures(), 1);
}

#[tokio::test]
async fn test_hanging_provider_times_out() {
    let config = WorldConfig {
        task_timeout: Duration::from_millis(50),
        ..test_config()
    };
    let world = build_world(FlakyProvider::hanging(), CountingGenerator::new(Duration::ZERO), config);
    let pos = ChunkPos::new(4, 4);

    let err = world.load_chunk(pos).await.unwrap_err();

    assert!(matches!(err, WorldError::Timeout { pos: Some(p), operation: "load" } if p == pos));
    assert!(!world.has_loaded_chunk(pos));
    assert_eq!(world.metrics().timeouts(), 1);
}

#[tokio::test]
async fn test_slow_generation_times_out() {
    let config = WorldConfig {
        generation_timeout: Duration::from_millis(20),
        ..test_config()
    };
    let generator = CountingGenerator::new(Duration::from_millis(300));
    let world = build_world(Arc::new(MemoryProvider::new()), generator, config);

    let err = world.load_chunk(ChunkPos::new(0, 0)).await.unwrap_err();

    assert!(matches!(err, WorldError::Timeout { operation: "generate", .. }));
    assert_eq!(world.loaded_chunk_count(), 0);
}

#[tokio::test]
async fn test_unknown_generator() {
    let meta = WorldMeta {
        generator: "vanilla".to_string(),
        ..WorldMeta::default()
    };
    let world = build_world(
        Arc::new(MemoryProvider::with_meta(meta)),
        CountingGenerator::new(Duration::ZERO),
        test_config(),
    );

    let err = world.load_chunk(ChunkPos::new(0, 0)).await.unwrap_err();
    assert!(matches!(err, WorldError::UnknownGenerator(ref name) if name == "vanilla"));
}

#[tokio::test]
async fn test_void_generator_selected_by_name() {
    let (world, _, generator) = memory_world();
    world.set_generator_name("void").await.unwrap();

    world.load_chunk(ChunkPos::new(0, 0)).await.unwrap();

    assert_eq!(generator.calls(), 0);
    assert_eq!(world.get_highest_block_at(5, 5).unwrap(), None);
    assert!(matches!(
        world.set_generator_name("amplified").await,
        Err(WorldError::UnknownGenerator(_))
    ));
}

#[tokio::test]
async fn test_world_view_reads_loaded_chunks() {
    let (world, _, _) = memory_world();
    world.load_chunk(ChunkPos::new(-1, -1)).await.unwrap();

    let view: &dyn WorldView = &*world;
    assert!(view.is_chunk_loaded(ChunkPos::new(-1, -1)));
    assert!(!view.is_chunk_loaded(ChunkPos::new(0, 0)));
    let bedrock = view.blocks().by_name("bedrock", 0).unwrap().runtime_id;
    assert_eq!(view.block_runtime_id_at(-1, 0, -16), Some(bedrock));
    assert_eq!(view.block_runtime_id_at(0, 0, 0), None);
}
