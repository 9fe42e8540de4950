//! Partitioning of geometry batches into contiguous chunks.

use std::ops::Range;

use cell_common::{ConversionError, Result};

/// One geometry of a batch with its surrogate id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryRecord<'a> {
    pub id: u64,
    /// Serialized geometry (WKB).
    pub geometry: &'a [u8],
}

/// A contiguous slice of a batch.
#[derive(Debug)]
pub struct Chunk<'a, G> {
    index: usize,
    ids: &'a [u64],
    geometries: &'a [G],
}

impl<'a, G: AsRef<[u8]> + 'a> Chunk<'a, G> {
    /// Position of the chunk in submission order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Records in input order.
    pub fn records(&self) -> impl Iterator<Item = GeometryRecord<'a>> + 'a {
        let (ids, geometries) = (self.ids, self.geometries);
        ids.iter()
            .zip(geometries)
            .map(|(id, geometry)| GeometryRecord {
                id: *id,
                geometry: geometry.as_ref(),
            })
    }
}

/// Splits parallel `ids` / `geometries` slices into `ceil(N / chunk_size)`
/// chunks, preserving order within and across chunks.
#[derive(Debug)]
pub struct VectorChunker<'a, G> {
    ids: &'a [u64],
    geometries: &'a [G],
    chunk_size: usize,
}

impl<'a, G: AsRef<[u8]> + 'a> VectorChunker<'a, G> {
    pub fn new(ids: &'a [u64], geometries: &'a [G], chunk_size: usize) -> Result<Self> {
        if ids.len() != geometries.len() {
            return Err(ConversionError::LengthMismatch {
                ids: ids.len(),
                geometries: geometries.len(),
            });
        }
        if chunk_size == 0 {
            return Err(ConversionError::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            ids,
            geometries,
            chunk_size,
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn num_chunks(&self) -> usize {
        self.len().div_ceil(self.chunk_size)
    }

    /// The chunk at `index`, or `None` past the end.
    pub fn chunk(&self, index: usize) -> Option<Chunk<'a, G>> {
        let start = index.checked_mul(self.chunk_size)?;
        if start >= self.len() {
            return None;
        }
        let end = start.saturating_add(self.chunk_size).min(self.len());
        Some(Chunk {
            index,
            ids: &self.ids[start..end],
            geometries: &self.geometries[start..end],
        })
    }

    /// The chunks with indexes in `window`, in order.
    pub fn chunks_in(&self, window: Range<usize>) -> Vec<Chunk<'a, G>> {
        window.map_while(|index| self.chunk(index)).collect()
    }

    /// All chunks in order.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk<'a, G>> + '_ {
        (0..self.num_chunks()).map_while(move |index| self.chunk(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometries(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| vec![i as u8]).collect()
    }

    #[test]
    fn test_chunk_count() {
        let ids: Vec<u64> = (0..10).collect();
        let geoms = geometries(10);
        for (chunk_size, expected) in [(1, 10), (3, 4), (5, 2), (10, 1), (1000, 1)] {
            let chunker = VectorChunker::new(&ids, &geoms, chunk_size).unwrap();
            assert_eq!(chunker.num_chunks(), expected, "chunk_size {}", chunk_size);
            assert_eq!(chunker.chunks().count(), expected);
        }
    }

    #[test]
    fn test_chunks_preserve_order() {
        let ids: Vec<u64> = (100..107).collect();
        let geoms = geometries(7);
        let chunker = VectorChunker::new(&ids, &geoms, 3).unwrap();

        let chunks: Vec<_> = chunker.chunks().collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 1);
        assert_eq!(chunks[1].index(), 1);

        let flattened: Vec<u64> = chunks
            .iter()
            .flat_map(|chunk| chunk.records().map(|record| record.id))
            .collect();
        assert_eq!(flattened, ids);

        let first = chunks[0].records().next().unwrap();
        assert_eq!(first.geometry, &[0u8][..]);
    }

    #[test]
    fn test_chunks_in_window() {
        let ids: Vec<u64> = (0..10).collect();
        let geoms = geometries(10);
        let chunker = VectorChunker::new(&ids, &geoms, 4).unwrap();

        let window = chunker.chunks_in(1..5);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].index(), 1);
        assert!(chunker.chunk(3).is_none());
    }

    #[test]
    fn test_empty_batch() {
        let ids: Vec<u64> = Vec::new();
        let geoms: Vec<Vec<u8>> = Vec::new();
        let chunker = VectorChunker::new(&ids, &geoms, 10).unwrap();
        assert!(chunker.is_empty());
        assert_eq!(chunker.num_chunks(), 0);
        assert!(chunker.chunk(0).is_none());
    }

    #[test]
    fn test_rejects_bad_input() {
        let ids = [1u64, 2];
        let geoms = geometries(3);
        assert!(matches!(
            VectorChunker::new(&ids, &geoms, 10),
            Err(ConversionError::LengthMismatch { ids: 2, geometries: 3 })
        ));

        let geoms = geometries(2);
        assert!(matches!(
            VectorChunker::new(&ids, &geoms, 0),
            Err(ConversionError::InvalidChunkSize(0))
        ));
    }
}
