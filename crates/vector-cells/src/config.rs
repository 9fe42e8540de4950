//! Configuration for vector conversion.

use serde::{Deserialize, Serialize};

/// Default number of geometries per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Configuration for chunked geometry conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Geometries per chunk. Must be > 0.
    pub chunk_size: usize,

    /// Worker threads. 0 uses one worker per CPU core.
    pub num_threads: usize,

    /// Chunks a lazy stream computes ahead of its consumer.
    /// 0 uses the number of workers.
    pub prefetch_chunks: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            num_threads: 0,
            prefetch_chunks: 0,
        }
    }
}

impl VectorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("VECTOR_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("VECTOR_NUM_THREADS") {
            if let Ok(threads) = val.parse() {
                config.num_threads = threads;
            }
        }

        if let Ok(val) = std::env::var("VECTOR_PREFETCH_CHUNKS") {
            if let Ok(chunks) = val.parse() {
                config.prefetch_chunks = chunks;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        Ok(())
    }

    /// Chunks per prefetch window for a pool of `workers` threads.
    pub fn prefetch_window(&self, workers: usize) -> usize {
        if self.prefetch_chunks > 0 {
            self.prefetch_chunks
        } else {
            workers.max(1)
        }
    }
}
