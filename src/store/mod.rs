//! Cell persistence behind a uniform store interface.
//!
//! The map evicts grid cells into a [`CellStore`] and pulls them back as the
//! sensor returns. A stored cell is exactly the pair of its identity
//! ([`CellInfo`], including depth) and its points. The store owns retrieved
//! state exclusively: retrieving a cell removes it, so a cell is never
//! simultaneously loaded in the map and present in the store.

mod disk;
mod memory;

pub use disk::DiskCellStore;
pub use memory::RamCellStore;

use std::collections::HashSet;

use crate::core::{CellInfo, PointCloud};
use crate::error::Result;

/// Persistence interface for evicted grid cells.
pub trait CellStore: Send {
    /// Remove and return the cell at the given coordinate.
    ///
    /// When nothing is stored there, returns a `CellInfo` carrying
    /// [`CellInfo::INVALID_DEPTH`] and an empty cloud. `requested_depth` is
    /// advisory, for stores that prefetch by expected relevance; the bundled
    /// stores ignore it.
    fn retrieve_cell(
        &mut self,
        row: i32,
        column: i32,
        aisle: i32,
        requested_depth: i32,
    ) -> Result<(CellInfo, PointCloud)>;

    /// Persist a cell, overwriting any prior entry at its coordinate. The
    /// points stay with the caller so a failed save can be rolled back into
    /// the active cloud.
    fn save_cell(&mut self, info: CellInfo, points: &PointCloud) -> Result<()>;

    /// Drop every stored cell.
    fn clear_all_cells(&mut self) -> Result<()>;

    /// Identities of every stored cell.
    fn all_cell_infos(&self) -> Result<HashSet<CellInfo>>;
}
