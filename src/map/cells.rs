//! Cell-cache load and unload.
//!
//! Loading materializes a rectangle of grid cells from the store into the
//! active cloud, nearest cells first. Unloading partitions the active cloud
//! in place, rebuckets the evicted points into per-cell subclouds, and saves
//! them with their accumulated depths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;

use crate::core::grid::ordered_indexes;
use crate::core::{CellInfo, GridCoord, PointCloud, Update};
use crate::error::Result;

use super::MapShared;

/// A cell pulled from the store during a load, held back until the whole
/// rectangle is in hand.
struct RetrievedCell {
    info: CellInfo,
    points: PointCloud,
    /// False for coordinates the store had nothing for; those never go back
    /// on rollback.
    from_store: bool,
}

/// Depth a newly materialized cell inherits: the minimum over all loaded
/// cells of their depth plus the Chebyshev distance, or 0 for an empty map.
pub fn compute_depth_of_cell(
    loaded_cells: &HashSet<CellInfo>,
    row: i32,
    column: i32,
    aisle: i32,
) -> i32 {
    let coord = GridCoord::new(row, column, aisle);
    loaded_cells
        .iter()
        .map(|cell| cell.depth + coord.chebyshev_distance(&cell.coord()))
        .min()
        .unwrap_or(0)
}

impl MapShared {
    /// Dispatch a cell job.
    pub(crate) fn apply_update(&self, update: &Update) -> Result<()> {
        if update.load {
            self.load_cells(update)
        } else {
            self.unload_cells(update)
        }
    }

    /// Materialize the rectangle's cells into the active cloud.
    ///
    /// Cells stream nearest-first relative to the sensor's grid position.
    /// Coordinates the store knows nothing about are still tracked in the
    /// loaded set, at the depth computed from their neighbors, so a later
    /// unload does not lose their identity.
    ///
    /// Retrieved cells are buffered; the map is only touched once the whole
    /// rectangle has been pulled from the store. On a retrieval failure the
    /// buffered cells are returned to the store and the error surfaces with
    /// the active cloud and the loaded set untouched.
    pub(crate) fn load_cells(&self, rect: &Update) -> Result<()> {
        let mut snapshot = self.local_cloud.lock().loaded_cells.clone();
        let position = self.pose.lock().position();

        let mut retrieved: Vec<RetrievedCell> = Vec::new();

        let row_indexes = ordered_indexes(
            rect.start_row,
            rect.end_row,
            self.geometry.to_grid(position[0]),
        );
        for i in row_indexes {
            let column_indexes = ordered_indexes(
                rect.start_column,
                rect.end_column,
                self.geometry.to_grid(position[1]),
            );
            for j in column_indexes {
                let aisle_indexes = if self.config.is_3d {
                    ordered_indexes(
                        rect.start_aisle,
                        rect.end_aisle,
                        self.geometry.to_grid(position[2]),
                    )
                } else {
                    vec![0]
                };
                for k in aisle_indexes {
                    let depth = compute_depth_of_cell(&snapshot, i, j, k);
                    let (mut info, points) =
                        match self.store.lock().retrieve_cell(i, j, k, depth) {
                            Ok(cell) => cell,
                            Err(error) => {
                                self.restore_retrieved(&retrieved);
                                return Err(error);
                            }
                        };

                    let from_store = !info.is_invalid();
                    if !from_store {
                        // Nothing stored here; the cell starts empty at the
                        // computed depth.
                        info.depth = depth;
                    }
                    snapshot.insert(info);
                    retrieved.push(RetrievedCell {
                        info,
                        points,
                        from_store,
                    });
                }
            }
        }

        let mut batch = PointCloud::new();
        let mut new_cells = HashSet::new();
        for cell in &retrieved {
            if !cell.points.is_empty() {
                batch.concatenate(&cell.points);
            }
            new_cells.insert(cell.info);
        }

        let mut local = self.local_cloud.lock();
        if !batch.is_empty() {
            local.cloud.concatenate(&batch);
            self.publish(&local.cloud);
            self.cloud_empty.store(false, Ordering::Release);
            self.new_cloud_available.store(true, Ordering::Release);
        }
        local.loaded_cells.extend(new_cells);
        Ok(())
    }

    /// Undo a partial load: cells already pulled out of the store go back
    /// into it. Cells the store never held are simply forgotten.
    fn restore_retrieved(&self, retrieved: &[RetrievedCell]) {
        let from_store = retrieved.iter().filter(|cell| cell.from_store).count();
        log::warn!(
            "Cell retrieval failed, returning {} retrieved cells to the store",
            from_store
        );
        let mut store = self.store.lock();
        for cell in retrieved {
            if !cell.from_store {
                continue;
            }
            if let Err(error) = store.save_cell(cell.info, &cell.points) {
                log::error!(
                    "Could not return cell ({}, {}, {}) to the store: {}",
                    cell.info.row,
                    cell.info.column,
                    cell.info.aisle,
                    error
                );
            }
        }
    }

    /// Evict the rectangle's cells from the active cloud into the store.
    ///
    /// Points are partitioned by a half-open world-interval test, grouped by
    /// grid coordinate, and saved with the depths recorded for their cells.
    /// If a save fails, the not-yet-saved groups are reinserted into the
    /// active cloud before the error surfaces.
    pub(crate) fn unload_cells(&self, rect: &Update) -> Result<()> {
        let (start_aisle, end_aisle) = if self.config.is_3d {
            (rect.start_aisle, rect.end_aisle)
        } else {
            (0, 0)
        };

        let start_x = self.geometry.inferior_world(rect.start_row);
        let end_x = self.geometry.superior_world(rect.end_row);
        let start_y = self.geometry.inferior_world(rect.start_column);
        let end_y = self.geometry.superior_world(rect.end_column);
        let start_z = self.geometry.inferior_world(start_aisle);
        let end_z = self.geometry.superior_world(end_aisle);

        let mut local = self.local_cloud.lock();

        let inside: Vec<bool> = (0..local.cloud.len())
            .map(|i| {
                let p = local.cloud.point(i);
                p[0] >= start_x
                    && p[0] < end_x
                    && p[1] >= start_y
                    && p[1] < end_y
                    && p[2] >= start_z
                    && p[2] < end_z
            })
            .collect();
        let mut old_cells = local.cloud.split_off_where(|i| inside[i]);

        self.publish(&local.cloud);

        let mut old_cell_depths: HashMap<GridCoord, i32> = HashMap::new();
        let seeded_depths = if local.loaded_cells.is_empty() {
            old_cells.depths().map(<[i32]>::to_vec)
        } else {
            None
        };
        if let Some(depths) = seeded_depths {
            // Seeded path: the only depth record is the column attached by
            // set_global_point_cloud.
            for i in 0..old_cells.len() {
                old_cell_depths.insert(self.grid_coord_of(&old_cells, i), depths[i]);
            }
            local.cloud.clear_depths();
            old_cells.clear_depths();
        } else {
            let mut evicted = Vec::new();
            for info in local.loaded_cells.iter() {
                if info.row >= rect.start_row
                    && info.row <= rect.end_row
                    && info.column >= rect.start_column
                    && info.column <= rect.end_column
                    && info.aisle >= start_aisle
                    && info.aisle <= end_aisle
                {
                    evicted.push(*info);
                }
            }
            for info in evicted {
                old_cell_depths.insert(info.coord(), info.depth);
                local.loaded_cells.remove(&info);
            }
        }

        self.cloud_empty
            .store(local.cloud.is_empty(), Ordering::Release);
        self.new_cloud_available.store(true, Ordering::Release);
        drop(local);

        let mut groups: HashMap<GridCoord, PointCloud> = HashMap::new();
        for i in 0..old_cells.len() {
            let coord = self.grid_coord_of(&old_cells, i);
            groups
                .entry(coord)
                .or_insert_with(|| old_cells.similar_empty())
                .push_from(&old_cells, i);
        }

        let cells: Vec<(CellInfo, PointCloud)> = groups
            .into_iter()
            .map(|(coord, points)| {
                let depth = old_cell_depths.get(&coord).copied().unwrap_or(0);
                (
                    CellInfo::new(coord.row, coord.column, coord.aisle, depth),
                    points,
                )
            })
            .collect();

        for (index, (info, points)) in cells.iter().enumerate() {
            if let Err(error) = self.store.lock().save_cell(*info, points) {
                self.rollback_unsaved(&cells[index..]);
                return Err(error);
            }
        }
        Ok(())
    }

    /// Reinsert cells whose save failed so the active cloud and the loaded
    /// set stay consistent with the store.
    fn rollback_unsaved(&self, unsaved: &[(CellInfo, PointCloud)]) {
        log::warn!(
            "Cell save failed, restoring {} unsaved cells to the active cloud",
            unsaved.len()
        );
        let mut local = self.local_cloud.lock();
        for (info, points) in unsaved {
            local.cloud.concatenate(points);
            local.loaded_cells.insert(*info);
        }
        self.publish(&local.cloud);
        self.cloud_empty
            .store(local.cloud.is_empty(), Ordering::Release);
        self.new_cloud_available.store(true, Ordering::Release);
    }

    fn grid_coord_of(&self, cloud: &PointCloud, index: usize) -> GridCoord {
        let p = cloud.point(index);
        GridCoord::new(
            self.geometry.to_grid(p[0]),
            self.geometry.to_grid(p[1]),
            if self.config.is_3d {
                self.geometry.to_grid(p[2])
            } else {
                0
            },
        )
    }
}
