use anyhow::Result;
use async_trait::async_trait;
use lodestone_chunk::Chunk;

/// A client that chunks are streamed to.
///
/// Encoding and transport are up to the implementation. `send_radius` calls
/// `send_chunk` once per loaded chunk in the area, then
/// `send_network_chunk_publisher_update` exactly once after every send finished.
#[async_trait]
pub trait Viewer: Send + Sync {
    async fn send_chunk(&self, chunk: &Chunk) -> Result<()>;

    /// Tells the client that the area around it is complete.
    async fn send_network_chunk_publisher_update(&self) -> Result<()>;
}
