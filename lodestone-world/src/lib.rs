//! In-memory chunk cache of a running world, with concurrent bulk loading,
//! streaming to viewers and write-back to a storage provider.

pub mod config;
pub mod error;
mod task;
pub mod viewer;
pub mod world;

pub use config::WorldConfig;
pub use error::{BatchError, WorldError};
pub use viewer::Viewer;
pub use world::{MAX_REGION_RADIUS, SharedChunk, World};
