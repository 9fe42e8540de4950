//! Grid cell identifiers and deduplicated cell sets.

use std::collections::HashSet;
use std::fmt;

use h3o::{CellIndex, Resolution};
use serde::{Deserialize, Serialize};

use crate::engine::GridEngine;
use crate::error::{ConversionError, Result};

/// Coarsest grid resolution.
pub const MIN_RESOLUTION: u8 = 0;

/// Finest grid resolution.
pub const MAX_RESOLUTION: u8 = 15;

/// Check that a resolution is within `0..=15`.
pub fn validate_resolution(resolution: u8) -> Result<()> {
    if resolution > MAX_RESOLUTION {
        Err(ConversionError::invalid_resolution(format!(
            "resolution out of range: {} (expected {}..={})",
            resolution, MIN_RESOLUTION, MAX_RESOLUTION
        )))
    } else {
        Ok(())
    }
}

/// Opaque 64-bit hexagonal grid cell identifier.
///
/// Values are only produced by a [`GridEngine`](crate::GridEngine); the
/// numeric ordering carries no spatial meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridCellId(u64);

impl GridCellId {
    /// Wrap a raw 64-bit cell index without validation.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw 64-bit value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Resolution encoded in the identifier.
    pub fn resolution(self) -> Result<u8> {
        Ok(u8::from(self.to_cell_index()?.resolution()))
    }

    pub(crate) fn to_cell_index(self) -> Result<CellIndex> {
        CellIndex::try_from(self.0).map_err(|_| ConversionError::InvalidCell(self.0))
    }
}

impl From<CellIndex> for GridCellId {
    fn from(cell: CellIndex) -> Self {
        Self(u64::from(cell))
    }
}

impl From<GridCellId> for u64 {
    fn from(cell: GridCellId) -> Self {
        cell.0
    }
}

impl fmt::Display for GridCellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

pub(crate) fn to_resolution(resolution: u8) -> Result<Resolution> {
    validate_resolution(resolution)?;
    Ok(Resolution::try_from(resolution)?)
}

/// A deduplicated set of grid cells, possibly spanning several resolutions
/// after compaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSet {
    cells: HashSet<GridCellId>,
}

impl CellSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cell. Returns `false` if it was already present.
    pub fn insert(&mut self, cell: GridCellId) -> bool {
        self.cells.insert(cell)
    }

    /// Move all cells of `other` into this set.
    pub fn union_with(&mut self, other: CellSet) {
        if self.cells.len() < other.cells.len() {
            let mut larger = other.cells;
            larger.extend(self.cells.drain());
            self.cells = larger;
        } else {
            self.cells.extend(other.cells);
        }
    }

    pub fn contains(&self, cell: &GridCellId) -> bool {
        self.cells.contains(cell)
    }

    /// Check whether the set contains the cell itself or any of its
    /// ancestors. This walks all coarser resolutions, so it is not cheap.
    pub fn contains_or_ancestor(&self, cell: GridCellId) -> Result<bool> {
        if self.cells.contains(&cell) {
            return Ok(true);
        }
        let index = cell.to_cell_index()?;
        let resolution = u8::from(index.resolution());
        for parent_res in (MIN_RESOLUTION..resolution).rev() {
            let parent = index
                .parent(to_resolution(parent_res)?)
                .map(GridCellId::from);
            if let Some(parent) = parent {
                if self.cells.contains(&parent) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GridCellId> {
        self.cells.iter()
    }

    /// Number of cells at each resolution, indexed by resolution.
    pub fn len_resolutions(&self) -> Result<Vec<usize>> {
        let mut counts = vec![0usize; MAX_RESOLUTION as usize + 1];
        for cell in &self.cells {
            counts[cell.resolution()? as usize] += 1;
        }
        Ok(counts)
    }

    /// The cells stored at exactly `resolution`.
    pub fn compacted_at_resolution(&self, resolution: u8) -> Result<Vec<GridCellId>> {
        validate_resolution(resolution)?;
        let mut out = Vec::new();
        for cell in &self.cells {
            if cell.resolution()? == resolution {
                out.push(*cell);
            }
        }
        Ok(out)
    }

    /// Expand the set to `resolution` through `engine`.
    pub fn uncompacted<E: GridEngine + ?Sized>(&self, engine: &E, resolution: u8) -> Result<CellSet> {
        engine.uncompact(self, resolution)
    }

    /// Cells sorted by their raw value, for stable output.
    pub fn to_sorted_vec(&self) -> Vec<GridCellId> {
        let mut cells: Vec<_> = self.cells.iter().copied().collect();
        cells.sort_unstable();
        cells
    }
}

impl FromIterator<GridCellId> for CellSet {
    fn from_iter<I: IntoIterator<Item = GridCellId>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl Extend<GridCellId> for CellSet {
    fn extend<I: IntoIterator<Item = GridCellId>>(&mut self, iter: I) {
        self.cells.extend(iter)
    }
}

impl IntoIterator for CellSet {
    type Item = GridCellId;
    type IntoIter = std::collections::hash_set::IntoIter<GridCellId>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

impl<'a> IntoIterator for &'a CellSet {
    type Item = &'a GridCellId;
    type IntoIter = std::collections::hash_set::Iter<'a, GridCellId>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}
