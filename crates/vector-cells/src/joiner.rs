//! Parallel chunk processing and the join back to input records.
//!
//! Chunks are indexed concurrently, but their outputs are always assembled
//! in chunk submission order, so the row order of a result only depends on
//! the input and the chunk size.

use std::collections::HashMap;
use std::ops::Range;
use std::time::Instant;

use cell_common::{ConversionError, GridCellId, Result, WorkerPool};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::chunker::{Chunk, VectorChunker};
use crate::indexer::GeometryIndexer;

/// `(surrogate_id, cell)` pairs of one chunk, in record order.
pub type CellPairs = Vec<(u64, GridCellId)>;

/// One input record paired with one of its cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow<R> {
    pub record: R,
    pub cell: GridCellId,
}

/// Index every record of a chunk, sequentially.
pub fn process_chunk<I, G>(
    indexer: &I,
    chunk: &Chunk<'_, G>,
    resolution: u8,
    do_compact: bool,
) -> Result<CellPairs>
where
    I: GeometryIndexer + ?Sized,
    G: AsRef<[u8]>,
{
    let mut pairs = Vec::with_capacity(chunk.len());
    for record in chunk.records() {
        let cells = indexer.convert(record.id, record.geometry, resolution, do_compact)?;
        pairs.extend(cells.into_iter().map(|cell| (record.id, cell)));
    }
    Ok(pairs)
}

/// Runs chunks on a worker pool and concatenates their results in order.
pub struct ParallelMergeJoiner<'a, I: GeometryIndexer + ?Sized> {
    indexer: &'a I,
    pool: &'a WorkerPool,
}

impl<'a, I: GeometryIndexer + ?Sized> ParallelMergeJoiner<'a, I> {
    pub fn new(indexer: &'a I, pool: &'a WorkerPool) -> Self {
        Self { indexer, pool }
    }

    /// Results of the chunks in `window`, one entry per chunk in order.
    ///
    /// The first failing chunk aborts the window; no partial results are
    /// returned.
    pub fn process_window<G>(
        &self,
        chunker: &VectorChunker<'_, G>,
        window: Range<usize>,
        resolution: u8,
        do_compact: bool,
    ) -> Result<Vec<CellPairs>>
    where
        G: AsRef<[u8]> + Sync,
    {
        let start = Instant::now();
        let chunks = chunker.chunks_in(window.clone());
        let results = self.pool.install(|| {
            chunks
                .par_iter()
                .map(|chunk| process_chunk(self.indexer, chunk, resolution, do_compact))
                .collect::<Result<Vec<_>>>()
        })?;
        debug!(
            first_chunk = window.start,
            chunks = results.len(),
            pairs = results.iter().map(Vec::len).sum::<usize>(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Processed chunk window"
        );
        Ok(results)
    }

    /// Results of all chunks concatenated in submission order.
    pub fn convert_all<G>(
        &self,
        chunker: &VectorChunker<'_, G>,
        resolution: u8,
        do_compact: bool,
    ) -> Result<CellPairs>
    where
        G: AsRef<[u8]> + Sync,
    {
        let results = self.process_window(chunker, 0..chunker.num_chunks(), resolution, do_compact)?;
        Ok(results.into_iter().flatten().collect())
    }
}

/// Inner join of `records` with cell `pairs` on the surrogate id.
///
/// `ids[i]` is the surrogate id of `records[i]`. Every pair becomes one row
/// carrying a copy of its record, in pair order. Records without any cell do
/// not appear in the result. The surrogate id itself is not part of the
/// output.
pub fn join_records<R: Clone>(
    records: &[R],
    ids: &[u64],
    pairs: &[(u64, GridCellId)],
) -> Result<Vec<MergedRow<R>>> {
    if records.len() != ids.len() {
        return Err(ConversionError::LengthMismatch {
            ids: ids.len(),
            geometries: records.len(),
        });
    }

    let mut positions = HashMap::with_capacity(ids.len());
    for (position, id) in ids.iter().enumerate() {
        if positions.insert(*id, position).is_some() {
            return Err(ConversionError::DuplicateSurrogateId(*id));
        }
    }

    let mut rows = Vec::with_capacity(pairs.len());
    let mut unmatched = 0usize;
    for (id, cell) in pairs {
        match positions.get(id) {
            Some(&position) => rows.push(MergedRow {
                record: records[position].clone(),
                cell: *cell,
            }),
            None => unmatched += 1,
        }
    }
    if unmatched > 0 {
        warn!(unmatched, "Dropped cell pairs without a matching record");
    }
    Ok(rows)
}
