//! World and player metadata records.

use serde::{Deserialize, Serialize};

use crate::StorageError;

/// A position in world space. Used for the world spawn and player positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl SpawnPosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl Default for SpawnPosition {
    fn default() -> Self {
        Self::new(0.0, 64.0, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum GameMode {
    #[default]
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl TryFrom<i32> for GameMode {
    type Error = StorageError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Survival),
            1 => Ok(Self::Creative),
            2 => Ok(Self::Adventure),
            3 => Ok(Self::Spectator),
            other => Err(StorageError::InvalidGameMode(other)),
        }
    }
}

impl From<GameMode> for i32 {
    fn from(mode: GameMode) -> Self {
        match mode {
            GameMode::Survival => 0,
            GameMode::Creative => 1,
            GameMode::Adventure => 2,
            GameMode::Spectator => 3,
        }
    }
}

/// Per-world settings kept by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldMeta {
    pub name: String,
    pub spawn: SpawnPosition,
    pub gamemode: GameMode,
    pub generator: String,
}

impl Default for WorldMeta {
    fn default() -> Self {
        Self {
            name: "world".to_string(),
            spawn: SpawnPosition::default(),
            gamemode: GameMode::Survival,
            generator: "flat".to_string(),
        }
    }
}

/// Contents of a player file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub position: SpawnPosition,
    pub gamemode: GameMode,
}
