//! Pose-driven cell scheduling.
//!
//! Each pose update projects the sensor range onto the grid, giving an
//! inferior and a superior index per axis. A bound only materializes work
//! when it moved at least [`SLAB_HYSTERESIS`] cells since the last job it
//! produced; the slab then covers exactly the crossed cells, padded by the
//! buffer, while the orthogonal axes span the current bounds plus buffer.
//! Axes are handled row, then column, then aisle; aisles are skipped in 2D.

use crate::core::{GridGeometry, Update};

/// Minimum bound displacement, in cells, before a slab job is produced.
pub(crate) const SLAB_HYSTERESIS: i32 = 2;

/// The grid bounds a pose update last reconciled, per axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SlabBounds {
    pub inferior: [i32; 3],
    pub superior: [i32; 3],
}

impl SlabBounds {
    /// Bounds of the sensor-range rectangle around `position`.
    pub fn from_position(
        geometry: &GridGeometry,
        position: [f32; 3],
        range: f32,
        is_3d: bool,
    ) -> Self {
        let axes = if is_3d { 3 } else { 2 };
        let mut bounds = Self::default();
        for axis in 0..axes {
            bounds.inferior[axis] = geometry.inferior_grid(position[axis], range);
            bounds.superior[axis] = geometry.superior_grid(position[axis], range);
        }
        bounds
    }

    /// The bounds rectangle grown by `buffer` cells on every side, as a
    /// load job.
    pub fn padded_rectangle(&self, buffer: i32) -> Update {
        Update::load(
            self.inferior[0] - buffer,
            self.superior[0] + buffer,
            self.inferior[1] - buffer,
            self.superior[1] + buffer,
            self.inferior[2] - buffer,
            self.superior[2] + buffer,
        )
    }
}

/// Compare `new` bounds against the last reconciled `bounds`, emit the slab
/// jobs for every bound that tripped the hysteresis, and fold the tripped
/// bounds into `bounds`.
///
/// At most one job per bound, so at most six per pose update. Orthogonal
/// axes of each slab use the bounds as already updated by earlier axes.
pub(crate) fn plan_slab_updates(
    bounds: &mut SlabBounds,
    new: &SlabBounds,
    buffer: i32,
    is_3d: bool,
) -> Vec<Update> {
    let mut updates = Vec::new();
    let axes = if is_3d { 3 } else { 2 };

    for axis in 0..axes {
        // Trailing edge.
        let old_inferior = bounds.inferior[axis];
        let new_inferior = new.inferior[axis];
        if (new_inferior - old_inferior).abs() >= SLAB_HYSTERESIS {
            if new_inferior < old_inferior {
                // Sensor retreated: load the cells behind the new edge.
                let thickness = old_inferior - new_inferior;
                updates.push(slab(
                    bounds,
                    axis,
                    new_inferior - buffer,
                    new_inferior - buffer + thickness - 1,
                    buffer,
                    true,
                ));
            } else {
                // Sensor advanced: evict the cells left behind.
                let thickness = new_inferior - old_inferior;
                updates.push(slab(
                    bounds,
                    axis,
                    old_inferior - buffer,
                    old_inferior - buffer + thickness - 1,
                    buffer,
                    false,
                ));
            }
            bounds.inferior[axis] = new_inferior;
        }

        // Leading edge.
        let old_superior = bounds.superior[axis];
        let new_superior = new.superior[axis];
        if (new_superior - old_superior).abs() >= SLAB_HYSTERESIS {
            if new_superior > old_superior {
                let thickness = new_superior - old_superior;
                updates.push(slab(
                    bounds,
                    axis,
                    new_superior + buffer - thickness + 1,
                    new_superior + buffer,
                    buffer,
                    true,
                ));
            } else {
                let thickness = old_superior - new_superior;
                updates.push(slab(
                    bounds,
                    axis,
                    old_superior + buffer - thickness + 1,
                    old_superior + buffer,
                    buffer,
                    false,
                ));
            }
            bounds.superior[axis] = new_superior;
        }
    }
    updates
}

/// A job covering `[slab_start, slab_end]` on `axis` and the buffered
/// current bounds on the other axes.
fn slab(
    bounds: &SlabBounds,
    axis: usize,
    slab_start: i32,
    slab_end: i32,
    buffer: i32,
    load: bool,
) -> Update {
    let mut start = [0i32; 3];
    let mut end = [0i32; 3];
    for other in 0..3 {
        if other == axis {
            start[other] = slab_start;
            end[other] = slab_end;
        } else {
            start[other] = bounds.inferior[other] - buffer;
            end[other] = bounds.superior[other] + buffer;
        }
    }
    if load {
        Update::load(start[0], end[0], start[1], end[1], start[2], end[2])
    } else {
        Update::unload(start[0], end[0], start[1], end[1], start[2], end[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds_2d(
        inferior_row: i32,
        superior_row: i32,
        inferior_column: i32,
        superior_column: i32,
    ) -> SlabBounds {
        SlabBounds {
            inferior: [inferior_row, inferior_column, 0],
            superior: [superior_row, superior_column, 0],
        }
    }

    #[test]
    fn test_from_position() {
        let geometry = GridGeometry::new(1.0);
        let bounds = SlabBounds::from_position(&geometry, [0.5, 0.5, 0.0], 2.0, false);
        assert_eq!(bounds, bounds_2d(-2, 2, -2, 2));
    }

    #[test]
    fn test_one_cell_shift_is_absorbed() {
        let mut bounds = bounds_2d(-2, 2, -2, 2);
        let new = bounds_2d(-1, 3, -2, 2);
        let updates = plan_slab_updates(&mut bounds, &new, 1, false);
        assert!(updates.is_empty());
        // Bounds stay put until the hysteresis trips.
        assert_eq!(bounds, bounds_2d(-2, 2, -2, 2));
    }

    #[test]
    fn test_two_cell_advance_produces_unload_and_load() {
        let mut bounds = bounds_2d(-2, 2, -2, 2);
        let new = bounds_2d(0, 4, -2, 2);
        let updates = plan_slab_updates(&mut bounds, &new, 1, false);

        assert_eq!(updates.len(), 2);
        // Trailing edge evicts rows [-3, -2].
        assert_eq!(updates[0], Update::unload(-3, -2, -3, 3, -1, 1));
        // Leading edge loads rows [4, 5].
        assert_eq!(updates[1], Update::load(4, 5, -3, 3, -1, 1));
        assert_eq!(bounds, bounds_2d(0, 4, -2, 2));
    }

    #[test]
    fn test_retreat_mirrors_advance() {
        let mut bounds = bounds_2d(0, 4, -2, 2);
        let new = bounds_2d(-2, 2, -2, 2);
        let updates = plan_slab_updates(&mut bounds, &new, 1, false);

        assert_eq!(updates.len(), 2);
        // Trailing edge loads the rows behind the new edge.
        assert_eq!(updates[0], Update::load(-3, -2, -3, 3, -1, 1));
        // Leading edge evicts the rows ahead of the old edge.
        assert_eq!(updates[1], Update::unload(4, 5, -3, 3, -1, 1));
    }

    #[test]
    fn test_column_slab_uses_updated_row_bounds() {
        let mut bounds = bounds_2d(-2, 2, -2, 2);
        // Diagonal move: both row and column bounds shift by 2.
        let new = bounds_2d(0, 4, 0, 4);
        let updates = plan_slab_updates(&mut bounds, &new, 1, false);

        assert_eq!(updates.len(), 4);
        // Column jobs span the already-updated row bounds [0-1, 4+1].
        assert_eq!(updates[2], Update::unload(-1, 5, -3, -2, -1, 1));
        assert_eq!(updates[3], Update::load(-1, 5, 4, 5, -1, 1));
    }

    #[test]
    fn test_aisle_axis_only_in_3d() {
        let mut bounds = SlabBounds {
            inferior: [-2, -2, -2],
            superior: [2, 2, 2],
        };
        let new = SlabBounds {
            inferior: [-2, -2, 0],
            superior: [2, 2, 4],
        };

        let mut bounds_2d_case = bounds;
        let updates = plan_slab_updates(&mut bounds_2d_case, &new, 1, false);
        assert!(updates.is_empty());

        let updates = plan_slab_updates(&mut bounds, &new, 1, true);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0], Update::unload(-3, 3, -3, 3, -3, -2));
        assert_eq!(updates[1], Update::load(-3, 3, -3, 3, 4, 5));
    }

    #[test]
    fn test_padded_rectangle() {
        let bounds = bounds_2d(-2, 2, -2, 2);
        let rect = bounds.padded_rectangle(1);
        assert_eq!(rect, Update::load(-3, 3, -3, 3, -1, 1));
    }
}
