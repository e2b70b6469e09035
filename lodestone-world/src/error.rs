use lodestone_chunk::ChunkPos;
use thiserror::Error;

fn at(pos: &Option<ChunkPos>) -> String {
    match pos {
        Some(pos) => format!(" for chunk {}", pos),
        None => String::new(),
    }
}

#[derive(Error, Debug)]
pub enum WorldError {
    /// The storage provider failed or returned corrupt data.
    #[error("provider failed{}", at(.pos))]
    Provider {
        pos: Option<ChunkPos>,
        source: anyhow::Error,
    },

    /// The configured generator could not produce the chunk.
    #[error("generation failed for chunk {pos}")]
    Generation { pos: ChunkPos, source: anyhow::Error },

    #[error("no generator registered as '{0}'")]
    UnknownGenerator(String),

    /// A block access, save or unload targeted a chunk that is not in memory.
    #[error("chunk {0} is not loaded")]
    ChunkNotLoaded(ChunkPos),

    /// An area operation asked for more chunks than it is allowed to cover.
    #[error("radius {radius} exceeds the maximum of {max}")]
    RadiusTooLarge { radius: i32, max: i32 },

    #[error("runtime id {0} is not in the block registry")]
    UnknownBlock(u32),

    #[error("viewer failed{}", at(.pos))]
    Viewer {
        pos: Option<ChunkPos>,
        source: anyhow::Error,
    },

    #[error("{operation} timed out{}", at(.pos))]
    Timeout {
        pos: Option<ChunkPos>,
        operation: &'static str,
    },

    /// A spawned task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

impl WorldError {
    /// Flatten into individual failures, unpacking batches.
    pub fn into_failures(self) -> Vec<WorldError> {
        match self {
            WorldError::Batch(batch) => batch.failures,
            other => vec![other],
        }
    }
}

/// Failures collected from a bulk operation after every task finished.
/// Work done by the tasks that succeeded is kept.
#[derive(Error, Debug)]
#[error("{} task(s) failed, {succeeded} succeeded", .failures.len())]
pub struct BatchError {
    pub failures: Vec<WorldError>,
    pub succeeded: usize,
}

impl BatchError {
    /// Combine the outcomes of several phases into one result.
    pub(crate) fn collect(results: Vec<Result<usize, WorldError>>) -> Result<usize, WorldError> {
        let mut succeeded = 0;
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(count) => succeeded += count,
                Err(WorldError::Batch(batch)) => {
                    succeeded += batch.succeeded;
                    failures.extend(batch.failures);
                }
                Err(other) => failures.push(other),
            }
        }

        if failures.is_empty() {
            Ok(succeeded)
        } else {
            Err(BatchError { failures, succeeded }.into())
        }
    }
}
