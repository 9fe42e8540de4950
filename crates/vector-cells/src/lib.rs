//! Vector to Hexagonal Grid Conversion
//!
//! This crate converts batches of WKB-encoded geometries into hexagonal grid
//! cells. Each geometry carries a caller-assigned surrogate id; the result is
//! a list of `(id, cell)` pairs that can be joined back to the caller's
//! records.
//!
//! # Architecture
//!
//! ```text
//! (ids, geometries)
//!      │
//!      ▼
//! VectorChunker ── contiguous chunks of `chunk_size` records
//!      │
//!      ▼
//! ParallelMergeJoiner
//!      │
//!      ├─► per chunk on the worker pool:
//!      │         check + decode WKB → polyfill → optional compaction
//!      │
//!      └─► concatenate chunk results in submission order
//!      │
//!      ├─► VectorConverter::vector_to_cells  (all chunks at once)
//!      ├─► ChunkStream                       (one chunk per item, lazily)
//!      └─► VectorConverter::to_table         (inner join back to records)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use vector_cells::{vector_to_cells, vector_to_cells_stream};
//!
//! let pairs = vector_to_cells(&ids, &wkb_geometries, 9, true, 1000)?;
//!
//! for chunk in vector_to_cells_stream(&ids, &wkb_geometries, 9, false, 1000)? {
//!     for (id, cell) in chunk? {
//!         // ...
//!     }
//! }
//! ```

pub mod chunker;
pub mod config;
pub mod converter;
pub mod indexer;
pub mod joiner;
pub mod stream;
pub mod wkb_reader;

// Re-export commonly used types at crate root
pub use chunker::{Chunk, GeometryRecord, VectorChunker};
pub use config::{VectorConfig, DEFAULT_CHUNK_SIZE};
pub use converter::VectorConverter;
pub use indexer::{GeometryIndexer, WkbIndexer};
pub use joiner::{join_records, process_chunk, CellPairs, MergedRow, ParallelMergeJoiner};
pub use stream::ChunkStream;
pub use wkb_reader::decode_wkb;

use cell_common::{GridCellId, Result};

fn converter_with_chunk_size(chunk_size: usize) -> Result<VectorConverter> {
    VectorConverter::new(VectorConfig {
        chunk_size,
        ..VectorConfig::from_env()
    })
}

/// Convert WKB geometries to `(id, cell)` pairs on the H3 grid.
///
/// `ids[i]` identifies `geometries[i]`. Pairs are grouped by input record in
/// input order. Other settings come from [`VectorConfig::from_env`].
///
/// Each call builds its own worker pool. Construct a [`VectorConverter`]
/// once to reuse a pool across calls.
pub fn vector_to_cells<G>(
    ids: &[u64],
    geometries: &[G],
    resolution: u8,
    do_compact: bool,
    chunk_size: usize,
) -> Result<Vec<(u64, GridCellId)>>
where
    G: AsRef<[u8]> + Sync,
{
    converter_with_chunk_size(chunk_size)?.vector_to_cells(ids, geometries, resolution, do_compact)
}

/// Like [`vector_to_cells`], but yields one result per chunk as the
/// consumer iterates. The stream owns a worker pool built for this call.
pub fn vector_to_cells_stream<'a, G>(
    ids: &'a [u64],
    geometries: &'a [G],
    resolution: u8,
    do_compact: bool,
    chunk_size: usize,
) -> Result<ChunkStream<'a, G>>
where
    G: AsRef<[u8]> + Sync,
{
    converter_with_chunk_size(chunk_size)?.stream(ids, geometries, resolution, do_compact)
}

/// Pair each record with every cell of its geometry.
///
/// Records whose geometry covers no cell are dropped. Like
/// [`vector_to_cells`], each call builds its own worker pool.
pub fn geometries_to_table<R, F>(
    records: &[R],
    geometry_of: F,
    resolution: u8,
    do_compact: bool,
    chunk_size: usize,
) -> Result<Vec<MergedRow<R>>>
where
    R: Clone,
    F: Fn(&R) -> &[u8],
{
    converter_with_chunk_size(chunk_size)?.to_table(records, geometry_of, resolution, do_compact)
}
