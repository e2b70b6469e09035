use std::time::Duration;

/// Tunables for a [`World`](crate::World).
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Upper bound for a single provider or viewer call.
    pub task_timeout: Duration,
    /// Upper bound for generating one chunk.
    pub generation_timeout: Duration,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(30),
            generation_timeout: Duration::from_secs(60),
        }
    }
}
