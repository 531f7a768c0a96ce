//! In-memory cell store.

use std::collections::{HashMap, HashSet};

use super::CellStore;
use crate::core::{CellInfo, GridCoord, PointCloud};
use crate::error::Result;

/// Cell store keeping evicted cells in a hash map.
#[derive(Default)]
pub struct RamCellStore {
    cells: HashMap<GridCoord, (i32, PointCloud)>,
}

impl RamCellStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the store holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl CellStore for RamCellStore {
    fn retrieve_cell(
        &mut self,
        row: i32,
        column: i32,
        aisle: i32,
        _requested_depth: i32,
    ) -> Result<(CellInfo, PointCloud)> {
        let coord = GridCoord::new(row, column, aisle);
        match self.cells.remove(&coord) {
            Some((depth, points)) => Ok((CellInfo::new(row, column, aisle, depth), points)),
            None => Ok((
                CellInfo::new(row, column, aisle, CellInfo::INVALID_DEPTH),
                PointCloud::new(),
            )),
        }
    }

    fn save_cell(&mut self, info: CellInfo, points: &PointCloud) -> Result<()> {
        self.cells.insert(info.coord(), (info.depth, points.clone()));
        Ok(())
    }

    fn clear_all_cells(&mut self) -> Result<()> {
        self.cells.clear();
        Ok(())
    }

    fn all_cell_infos(&self) -> Result<HashSet<CellInfo>> {
        Ok(self
            .cells
            .iter()
            .map(|(coord, (depth, _))| CellInfo::new(coord.row, coord.column, coord.aisle, *depth))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_cell_returns_sentinel() {
        let mut store = RamCellStore::new();
        let (info, points) = store.retrieve_cell(1, 2, 3, 0).unwrap();
        assert!(info.is_invalid());
        assert!(points.is_empty());
    }

    #[test]
    fn test_retrieve_removes_cell() {
        let mut store = RamCellStore::new();
        let cloud = PointCloud::from_points(&[[1.0, 2.0, 3.0]]);
        store.save_cell(CellInfo::new(0, 0, 0, 2), &cloud).unwrap();

        let (info, points) = store.retrieve_cell(0, 0, 0, 0).unwrap();
        assert_eq!(info.depth, 2);
        assert_eq!(points.len(), 1);
        assert!(store.is_empty());

        // Second retrieval finds nothing.
        let (info, _) = store.retrieve_cell(0, 0, 0, 0).unwrap();
        assert!(info.is_invalid());
    }

    #[test]
    fn test_save_overwrites() {
        let mut store = RamCellStore::new();
        store
            .save_cell(CellInfo::new(0, 0, 0, 1), &PointCloud::from_points(&[[1.0, 0.0, 0.0]]))
            .unwrap();
        store
            .save_cell(
                CellInfo::new(0, 0, 0, 5),
                &PointCloud::from_points(&[[2.0, 0.0, 0.0], [3.0, 0.0, 0.0]]),
            )
            .unwrap();

        assert_eq!(store.len(), 1);
        let (info, points) = store.retrieve_cell(0, 0, 0, 0).unwrap();
        assert_eq!(info.depth, 5);
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_all_cell_infos() {
        let mut store = RamCellStore::new();
        store
            .save_cell(CellInfo::new(0, 0, 0, 0), &PointCloud::new())
            .unwrap();
        store
            .save_cell(CellInfo::new(1, -1, 0, 3), &PointCloud::new())
            .unwrap();

        let infos = store.all_cell_infos().unwrap();
        assert_eq!(infos.len(), 2);
        assert!(infos.contains(&CellInfo::new(1, -1, 0, 3)));
    }
}
