//! Lazy chunk-by-chunk conversion.

use std::collections::VecDeque;
use std::iter::FusedIterator;

use cell_common::Result;
use tracing::debug;

use crate::chunker::VectorChunker;
use crate::converter::VectorConverter;
use crate::indexer::{GeometryIndexer, WkbIndexer};
use crate::joiner::CellPairs;

/// Single-pass iterator over per-chunk conversion results, in chunk order.
///
/// Chunks are computed in parallel windows of `prefetch_chunks` as the
/// consumer drains the previous window, so at most one window of results is
/// held at a time. After an error the stream yields that error and ends.
pub struct ChunkStream<'a, G, I: GeometryIndexer = WkbIndexer> {
    converter: VectorConverter<I>,
    chunker: VectorChunker<'a, G>,
    resolution: u8,
    do_compact: bool,
    window: usize,
    next_chunk: usize,
    buffered: VecDeque<CellPairs>,
    done: bool,
}

impl<'a, G, I> ChunkStream<'a, G, I>
where
    G: AsRef<[u8]> + Sync + 'a,
    I: GeometryIndexer,
{
    pub(crate) fn new(
        converter: VectorConverter<I>,
        chunker: VectorChunker<'a, G>,
        resolution: u8,
        do_compact: bool,
    ) -> Self {
        let window = converter.prefetch_window();
        debug!(
            geometries = chunker.len(),
            chunks = chunker.num_chunks(),
            window,
            "Opened chunk stream"
        );
        Self {
            converter,
            chunker,
            resolution,
            do_compact,
            window,
            next_chunk: 0,
            buffered: VecDeque::new(),
            done: false,
        }
    }

    /// Total number of chunks in the batch.
    pub fn num_chunks(&self) -> usize {
        self.chunker.num_chunks()
    }

    /// Chunks not yet yielded.
    pub fn remaining_chunks(&self) -> usize {
        if self.done {
            0
        } else {
            self.buffered.len() + (self.chunker.num_chunks() - self.next_chunk)
        }
    }

    fn refill(&mut self) -> Result<()> {
        let end = (self.next_chunk + self.window).min(self.chunker.num_chunks());
        let results = self.converter.joiner().process_window(
            &self.chunker,
            self.next_chunk..end,
            self.resolution,
            self.do_compact,
        )?;
        self.next_chunk = end;
        self.buffered.extend(results);
        Ok(())
    }
}

impl<'a, G, I> Iterator for ChunkStream<'a, G, I>
where
    G: AsRef<[u8]> + Sync + 'a,
    I: GeometryIndexer,
{
    type Item = Result<CellPairs>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(pairs) = self.buffered.pop_front() {
            return Some(Ok(pairs));
        }
        if self.done || self.next_chunk >= self.chunker.num_chunks() {
            self.done = true;
            return None;
        }
        match self.refill() {
            Ok(()) => self.buffered.pop_front().map(Ok),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.buffered.len(), Some(self.remaining_chunks()))
    }
}

impl<'a, G, I> FusedIterator for ChunkStream<'a, G, I>
where
    G: AsRef<[u8]> + Sync + 'a,
    I: GeometryIndexer,
{
}

impl<G: AsRef<[u8]>, I: GeometryIndexer> std::fmt::Debug for ChunkStream<'_, G, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("num_chunks", &self.chunker.num_chunks())
            .field("next_chunk", &self.next_chunk)
            .field("buffered", &self.buffered.len())
            .field("window", &self.window)
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorConfig;
    use cell_common::ConversionError;
    use test_utils::fixtures::wkb;

    fn converter(chunk_size: usize, prefetch_chunks: usize) -> VectorConverter {
        VectorConverter::new(VectorConfig {
            chunk_size,
            num_threads: 2,
            prefetch_chunks,
        })
        .unwrap()
    }

    fn points(n: usize) -> (Vec<u64>, Vec<Vec<u8>>) {
        let ids = (0..n as u64).collect();
        let geoms = (0..n)
            .map(|i| wkb::point(-170.0 + i as f64 * 3.0, -60.0 + i as f64 * 1.1))
            .collect();
        (ids, geoms)
    }

    #[test]
    fn test_stream_matches_batch() {
        let (ids, geoms) = points(23);
        for prefetch in [1, 3, 100] {
            let converter = converter(4, prefetch);
            let batch = converter.vector_to_cells(&ids, &geoms, 5, false).unwrap();

            let stream = converter.stream(&ids, &geoms, 5, false).unwrap();
            assert_eq!(stream.num_chunks(), 6);
            let chunks: Vec<CellPairs> = stream.collect::<Result<_>>().unwrap();
            assert_eq!(chunks.len(), 6);
            assert_eq!(chunks[5].len(), 3);
            assert_eq!(chunks.concat(), batch, "prefetch {}", prefetch);
        }
    }

    #[test]
    fn test_stream_is_lazy() {
        let (ids, geoms) = points(10);
        let mut stream = converter(1, 2).stream(&ids, &geoms, 3, false).unwrap();
        assert_eq!(stream.remaining_chunks(), 10);

        let first = stream.next().unwrap().unwrap();
        assert_eq!(first[0].0, 0);
        // one window computed, one chunk of it still buffered
        assert_eq!(stream.next_chunk, 2);
        assert_eq!(stream.remaining_chunks(), 9);
        assert_eq!(stream.size_hint(), (1, Some(9)));
    }

    #[test]
    fn test_stream_fuses_after_error() {
        let (ids, mut geoms) = points(6);
        geoms[3] = vec![0xff];
        let mut stream = converter(2, 1).stream(&ids, &geoms, 4, false).unwrap();

        assert!(stream.next().unwrap().is_ok());
        let err = stream.next().unwrap().unwrap_err();
        assert!(matches!(err, ConversionError::InvalidGeometry { id: 3, .. }));
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
        assert_eq!(stream.remaining_chunks(), 0);
    }

    #[test]
    fn test_debug_reports_progress() {
        let (ids, geoms) = points(5);
        let mut stream = converter(2, 1).stream(&ids, &geoms, 4, false).unwrap();
        stream.next();
        let debug = format!("{:?}", stream);
        assert!(debug.contains("num_chunks: 3"));
        assert!(debug.contains("next_chunk: 1"));
    }

    #[test]
    fn test_empty_stream() {
        let ids: Vec<u64> = Vec::new();
        let geoms: Vec<Vec<u8>> = Vec::new();
        let mut stream = converter(10, 0).stream(&ids, &geoms, 4, false).unwrap();
        assert!(stream.next().is_none());
    }
}
