//! Cell identity and cell-cache job records.

use serde::{Deserialize, Serialize};

use super::grid::{max_grid_coordinate, min_grid_coordinate, GridCoord};

/// Identity of a grid cell, including its displacement depth.
///
/// `depth` counts how far the cell's contents have drifted from their cell of
/// origin through load/unload cycles, as the minimum Chebyshev distance (in
/// grid units) to any originating cell. A freshly created cell has depth 0.
///
/// Equality and hashing cover all four fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellInfo {
    pub row: i32,
    pub column: i32,
    pub aisle: i32,
    pub depth: i32,
}

impl CellInfo {
    /// Sentinel depth marking "the store has nothing at this coordinate".
    pub const INVALID_DEPTH: i32 = -1;

    /// Create a cell identity.
    #[inline]
    pub fn new(row: i32, column: i32, aisle: i32, depth: i32) -> Self {
        Self {
            row,
            column,
            aisle,
            depth,
        }
    }

    /// The cell's grid coordinate, without the depth.
    #[inline]
    pub fn coord(&self) -> GridCoord {
        GridCoord::new(self.row, self.column, self.aisle)
    }

    /// Whether this identity carries the "nothing stored" sentinel.
    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.depth == Self::INVALID_DEPTH
    }
}

/// A rectangular cell-cache job. Bounds are inclusive on every axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Update {
    pub start_row: i32,
    pub end_row: i32,
    pub start_column: i32,
    pub end_column: i32,
    pub start_aisle: i32,
    pub end_aisle: i32,
    /// Load the rectangle from the store when true, evict it when false.
    pub load: bool,
}

impl Update {
    /// A load job over the given rectangle.
    pub fn load(
        start_row: i32,
        end_row: i32,
        start_column: i32,
        end_column: i32,
        start_aisle: i32,
        end_aisle: i32,
    ) -> Self {
        Self {
            start_row,
            end_row,
            start_column,
            end_column,
            start_aisle,
            end_aisle,
            load: true,
        }
    }

    /// An unload job over the given rectangle.
    pub fn unload(
        start_row: i32,
        end_row: i32,
        start_column: i32,
        end_column: i32,
        start_aisle: i32,
        end_aisle: i32,
    ) -> Self {
        Self {
            start_row,
            end_row,
            start_column,
            end_column,
            start_aisle,
            end_aisle,
            load: false,
        }
    }

    /// An unload spanning the whole representable grid. Used by the
    /// first-pose flush; consumers must not derive an extent from these
    /// bounds (it would overflow `i32`).
    pub fn unload_all() -> Self {
        let min = min_grid_coordinate();
        let max = max_grid_coordinate();
        Self::unload(min, max, min, max, min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_cell_info_identity_includes_depth() {
        let mut set = HashSet::new();
        set.insert(CellInfo::new(1, 2, 0, 0));
        set.insert(CellInfo::new(1, 2, 0, 3));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&CellInfo::new(1, 2, 0, 3)));
    }

    #[test]
    fn test_invalid_sentinel() {
        let info = CellInfo::new(0, 0, 0, CellInfo::INVALID_DEPTH);
        assert!(info.is_invalid());
        assert!(!CellInfo::new(0, 0, 0, 0).is_invalid());
    }

    #[test]
    fn test_unload_all_bounds() {
        let update = Update::unload_all();
        assert!(!update.load);
        assert_eq!(update.start_row, i32::MIN);
        assert_eq!(update.end_row, i32::MAX - 1);
    }
}
