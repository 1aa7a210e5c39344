//! Cell storage implementation
//!
//! Sparse storage for the cells of one sheet. Only non-empty cells are stored,
//! using a row-based BTreeMap structure.

use std::collections::BTreeMap;
use std::ops::Bound;

use super::{CellAddress, CellRange, RawCell};

/// Sparse row-based storage for worksheet cells
///
/// - Uses BTreeMap for ordered iteration (rectangle queries become two
///   nested range scans)
/// - Row-major layout matches how worksheets are written on disk
/// - Only stores non-empty cells (sparse)
///
/// Structure: `BTreeMap<row_index, BTreeMap<col_index, RawCell>>`, both 1-based
#[derive(Debug, Clone, Default)]
pub struct CellStorage {
    rows: BTreeMap<u32, BTreeMap<u32, RawCell>>,
}

impl CellStorage {
    /// Create a new empty cell storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell
    pub fn get(&self, row: u32, col: u32) -> Option<&RawCell> {
        self.rows.get(&row).and_then(|r| r.get(&col))
    }

    /// Set a cell
    ///
    /// If the cell is empty (no value, no formula), the cell is removed.
    pub fn set(&mut self, row: u32, col: u32, cell: RawCell) {
        if cell.is_empty() {
            self.remove(row, col);
        } else {
            self.rows.entry(row).or_default().insert(col, cell);
        }
    }

    /// Remove a cell
    pub fn remove(&mut self, row: u32, col: u32) -> Option<RawCell> {
        let row_map = self.rows.get_mut(&row)?;
        let result = row_map.remove(&col);

        // Clean up empty rows
        if row_map.is_empty() {
            self.rows.remove(&row);
        }

        result
    }

    /// Get the number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the bounding rectangle of used cells, or None if empty
    pub fn used_range(&self) -> Option<CellRange> {
        let min_row = *self.rows.keys().next()?;
        let max_row = *self.rows.keys().next_back()?;

        let mut min_col = u32::MAX;
        let mut max_col = 0u32;

        for row_data in self.rows.values() {
            if let Some(&col) = row_data.keys().next() {
                min_col = min_col.min(col);
            }
            if let Some(&col) = row_data.keys().next_back() {
                max_col = max_col.max(col);
            }
        }

        Some(CellRange::from_indices(min_row, min_col, max_row, max_col))
    }

    /// Iterate over all cells in row order
    pub fn iter(&self) -> impl Iterator<Item = (CellAddress, &RawCell)> {
        self.rows.iter().flat_map(|(&row, cols)| {
            cols.iter()
                .map(move |(&col, cell)| (CellAddress::new(row, col), cell))
        })
    }

    /// Iterate over the populated cells inside a rectangle, row by row
    pub fn iter_range<'a>(
        &'a self,
        range: &CellRange,
    ) -> impl Iterator<Item = (CellAddress, &'a RawCell)> + 'a {
        let rows = (
            Bound::Included(range.start.row),
            Bound::Included(range.end.row),
        );
        let cols = (
            Bound::Included(range.start.col),
            Bound::Included(range.end.col),
        );
        self.rows.range(rows).flat_map(move |(&row, row_data)| {
            row_data
                .range(cols)
                .map(move |(&col, cell)| (CellAddress::new(row, col), cell))
        })
    }

    /// Iterate over row indices that have data
    pub fn row_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.rows.keys().copied()
    }
}
