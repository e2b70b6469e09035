use std::collections::HashMap;
use std::sync::Arc;

use lodestone_chunk::ChunkPos;
use parking_lot::Mutex;

/// Encoded chunks waiting to be written to a backing store.
///
/// A blob stays staged while its write is in flight, so readers keep seeing the
/// newest data until the store has it.
#[derive(Default)]
pub(crate) struct StagedChunks {
    blobs: Mutex<HashMap<ChunkPos, Arc<Vec<u8>>>>,
}

impl StagedChunks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, pos: ChunkPos, blob: Vec<u8>) {
        self.blobs.lock().insert(pos, Arc::new(blob));
    }

    pub(crate) fn get(&self, pos: ChunkPos) -> Option<Arc<Vec<u8>>> {
        self.blobs.lock().get(&pos).cloned()
    }

    /// Drop `blob` once it is durable. Returns false, keeping the entry, if the
    /// chunk was restaged after `blob` was taken.
    pub(crate) fn commit(&self, pos: ChunkPos, blob: &Arc<Vec<u8>>) -> bool {
        let mut blobs = self.blobs.lock();
        match blobs.get(&pos) {
            Some(current) if Arc::ptr_eq(current, blob) => {
                blobs.remove(&pos);
                true
            }
            _ => false,
        }
    }
}
