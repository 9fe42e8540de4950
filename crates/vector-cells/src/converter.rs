//! Entry point for vector conversion.

use std::sync::Arc;
use std::time::Instant;

use cell_common::{validate_resolution, ConversionError, GridCellId, Result, WorkerPool};
use tracing::info;

use crate::chunker::VectorChunker;
use crate::config::VectorConfig;
use crate::indexer::{GeometryIndexer, WkbIndexer};
use crate::joiner::{join_records, MergedRow, ParallelMergeJoiner};
use crate::stream::ChunkStream;

/// Converts batches of serialized geometries to grid cells.
///
/// Cloning is cheap; clones share the indexer and worker pool. Calls share
/// no mutable state and may run concurrently.
pub struct VectorConverter<I: GeometryIndexer = WkbIndexer> {
    indexer: Arc<I>,
    pool: Arc<WorkerPool>,
    config: VectorConfig,
}

impl VectorConverter<WkbIndexer> {
    pub fn new(config: VectorConfig) -> Result<Self> {
        Self::with_indexer(WkbIndexer::new(), config)
    }
}

impl<I: GeometryIndexer> VectorConverter<I> {
    pub fn with_indexer(indexer: I, config: VectorConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(ConversionError::InvalidChunkSize(config.chunk_size));
        }
        config.validate().map_err(ConversionError::Config)?;
        let pool = WorkerPool::new(config.num_threads)?;
        Ok(Self {
            indexer: Arc::new(indexer),
            pool: Arc::new(pool),
            config,
        })
    }

    pub fn config(&self) -> &VectorConfig {
        &self.config
    }

    pub(crate) fn joiner(&self) -> ParallelMergeJoiner<'_, I> {
        ParallelMergeJoiner::new(self.indexer.as_ref(), self.pool.as_ref())
    }

    pub(crate) fn prefetch_window(&self) -> usize {
        self.config.prefetch_window(self.pool.current_num_threads())
    }

    /// `(id, cell)` pairs for a batch, in input order.
    ///
    /// An empty batch yields an empty result.
    pub fn vector_to_cells<G>(
        &self,
        ids: &[u64],
        geometries: &[G],
        resolution: u8,
        do_compact: bool,
    ) -> Result<Vec<(u64, GridCellId)>>
    where
        G: AsRef<[u8]> + Sync,
    {
        validate_resolution(resolution)?;
        let chunker = VectorChunker::new(ids, geometries, self.config.chunk_size)?;
        let start = Instant::now();
        let pairs = self.joiner().convert_all(&chunker, resolution, do_compact)?;
        info!(
            geometries = chunker.len(),
            chunks = chunker.num_chunks(),
            resolution,
            do_compact,
            pairs = pairs.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Converted geometries to cells"
        );
        Ok(pairs)
    }

    /// Lazy, single-pass variant of [`vector_to_cells`](Self::vector_to_cells)
    /// yielding one result per chunk.
    pub fn stream<'a, G>(
        &self,
        ids: &'a [u64],
        geometries: &'a [G],
        resolution: u8,
        do_compact: bool,
    ) -> Result<ChunkStream<'a, G, I>>
    where
        G: AsRef<[u8]> + Sync,
    {
        validate_resolution(resolution)?;
        let chunker = VectorChunker::new(ids, geometries, self.config.chunk_size)?;
        Ok(ChunkStream::new(self.clone(), chunker, resolution, do_compact))
    }

    /// One row per `(record, cell)`, in record order.
    ///
    /// Records whose geometry covers no cell are dropped.
    pub fn to_table<R, F>(
        &self,
        records: &[R],
        geometry_of: F,
        resolution: u8,
        do_compact: bool,
    ) -> Result<Vec<MergedRow<R>>>
    where
        R: Clone,
        F: Fn(&R) -> &[u8],
    {
        let geometries: Vec<&[u8]> = records.iter().map(|record| geometry_of(record)).collect();
        let ids: Vec<u64> = (0..records.len() as u64).collect();
        let pairs = self.vector_to_cells(&ids, &geometries, resolution, do_compact)?;
        join_records(records, &ids, &pairs)
    }
}

impl<I: GeometryIndexer> Clone for VectorConverter<I> {
    fn clone(&self) -> Self {
        Self {
            indexer: Arc::clone(&self.indexer),
            pool: Arc::clone(&self.pool),
            config: self.config.clone(),
        }
    }
}

impl<I: GeometryIndexer> std::fmt::Debug for VectorConverter<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorConverter")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish()
    }
}
