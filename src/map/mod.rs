//! The dynamic map: a pose-centric sliding window over a cell store.
//!
//! [`DynamicMap`] keeps an active point cloud of the sensor's surroundings.
//! Pose updates stream grid cells in from the backing [`CellStore`] and
//! evict cells the sensor has left behind; scan updates merge fresh lidar
//! returns and maintain per-point dynamic probabilities. Every mutation of
//! the active cloud is republished to the ICP sink.
//!
//! # Threads
//!
//! Three threads touch the map: the caller (pose and scan updates, getters),
//! the background cell-update worker (online mode), and the external ICP
//! consumer reading through the sink mutex. Internal locks:
//!
//! - the active-cloud lock guards the cloud and the loaded-cell set
//! - the pose lock guards the last known sensor pose
//! - the store lock serializes all `CellStore` calls
//!
//! The active-cloud lock is never held across a store call, and the ICP
//! sink mutex is only ever acquired while holding the active-cloud lock
//! (in that order).

mod cells;
mod dynamic;
mod scheduler;
mod worker;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Sender};
use kiddo::{KdTree, SquaredEuclidean};
use parking_lot::Mutex;

use crate::config::MapperConfig;
use crate::core::{CellInfo, GridCoord, GridGeometry, PointCloud, Pose, Update};
use crate::error::{Error, Result};
use crate::filters::ScanFilter;
use crate::icp::SharedIcpSink;
use crate::store::{CellStore, DiskCellStore, RamCellStore};

use scheduler::SlabBounds;
use worker::UpdateWorker;

pub use cells::compute_depth_of_cell;

/// Active cloud and the identities of the cells it currently holds.
pub(crate) struct LocalCloud {
    pub cloud: PointCloud,
    pub loaded_cells: HashSet<CellInfo>,
}

/// State shared between the caller, the update worker, and the getters.
pub(crate) struct MapShared {
    pub config: MapperConfig,
    pub geometry: GridGeometry,
    pub local_cloud: Mutex<LocalCloud>,
    pub pose: Mutex<Pose>,
    pub store: Mutex<Box<dyn CellStore>>,
    pub icp: SharedIcpSink,
    pub new_cloud_available: AtomicBool,
    pub cloud_empty: AtomicBool,
    pub first_pose_update: AtomicBool,
    pub pending_updates: AtomicUsize,
}

impl MapShared {
    /// Push the given cloud to the ICP sink. Callers hold the active-cloud
    /// lock; the sink mutex nests inside it.
    pub(crate) fn publish(&self, cloud: &PointCloud) {
        self.icp.lock().set_reference_map(cloud);
    }
}

/// Dynamic, pose-centric spatial map consumed by an ICP registrar.
pub struct DynamicMap {
    shared: Arc<MapShared>,
    bounds: SlabBounds,
    sender: Option<Sender<Update>>,
    _worker: Option<UpdateWorker>,
}

impl DynamicMap {
    /// Create a map with the store selected by
    /// `config.save_cells_on_hard_drive`: a [`DiskCellStore`] under the
    /// system temporary directory, or a [`RamCellStore`].
    pub fn new(config: MapperConfig, icp: SharedIcpSink) -> Result<Self> {
        let store: Box<dyn CellStore> = if config.save_cells_on_hard_drive {
            let base = std::env::temp_dir().join("gati-map-cells");
            Box::new(DiskCellStore::open(&base)?)
        } else {
            Box::new(RamCellStore::new())
        };
        Self::with_store(config, store, icp)
    }

    /// Create a map over a caller-provided cell store.
    pub fn with_store(
        config: MapperConfig,
        store: Box<dyn CellStore>,
        icp: SharedIcpSink,
    ) -> Result<Self> {
        config.validate()?;

        let geometry = GridGeometry::new(config.cell_size);
        let is_online = config.is_online;
        let shared = Arc::new(MapShared {
            config,
            geometry,
            local_cloud: Mutex::new(LocalCloud {
                cloud: PointCloud::new(),
                loaded_cells: HashSet::new(),
            }),
            pose: Mutex::new(Pose::identity()),
            store: Mutex::new(store),
            icp,
            new_cloud_available: AtomicBool::new(false),
            cloud_empty: AtomicBool::new(true),
            first_pose_update: AtomicBool::new(true),
            pending_updates: AtomicUsize::new(0),
        });

        let (sender, worker) = if is_online {
            let (sender, receiver) = unbounded();
            let worker = UpdateWorker::spawn(Arc::clone(&shared), receiver)?;
            (Some(sender), Some(worker))
        } else {
            (None, None)
        };

        Ok(Self {
            shared,
            bounds: SlabBounds::default(),
            sender,
            _worker: worker,
        })
    }

    /// Record a new sensor pose and reconcile the set of loaded cells.
    ///
    /// The first call wipes the store, flushes any pre-seeded points into it
    /// with a full-range unload, and loads the hysteresis-padded rectangle
    /// around the sensor synchronously. Later calls schedule incremental
    /// slab jobs; online these run on the worker, offline they run here.
    pub fn update_pose(&mut self, pose: &Pose) -> Result<()> {
        *self.shared.pose.lock() = *pose;

        let config = &self.shared.config;
        let position = pose.position();
        let new_bounds = SlabBounds::from_position(
            &self.shared.geometry,
            position,
            config.sensor_max_range,
            config.is_3d,
        );

        if self.shared.first_pose_update.load(Ordering::Acquire) {
            self.bounds = new_bounds;

            self.shared.store.lock().clear_all_cells()?;
            self.shared.local_cloud.lock().loaded_cells.clear();

            // Flush pre-seeded points into the store, rebucketed per cell.
            self.shared.unload_cells(&Update::unload_all())?;
            self.shared
                .load_cells(&self.bounds.padded_rectangle(config.buffer_size))?;

            self.shared.first_pose_update.store(false, Ordering::Release);
        } else {
            let updates = scheduler::plan_slab_updates(
                &mut self.bounds,
                &new_bounds,
                config.buffer_size,
                config.is_3d,
            );
            for update in updates {
                self.schedule_update(update)?;
            }
        }
        Ok(())
    }

    fn schedule_update(&self, update: Update) -> Result<()> {
        match &self.sender {
            Some(sender) => {
                self.shared.pending_updates.fetch_add(1, Ordering::SeqCst);
                if sender.send(update).is_err() {
                    // Worker already shut down; nothing will consume the job.
                    self.shared.pending_updates.fetch_sub(1, Ordering::SeqCst);
                    log::error!(
                        "Dropping cell {} for rows [{}, {}], columns [{}, {}]: \
                         the update worker is gone",
                        if update.load { "load" } else { "unload" },
                        update.start_row,
                        update.end_row,
                        update.start_column,
                        update.end_column,
                    );
                }
                Ok(())
            }
            None => self.shared.apply_update(&update),
        }
    }

    /// Merge a new scan (world frame) into the active cloud.
    ///
    /// When dynamic-probability updates are enabled the input receives the
    /// configured prior and the visibility model reweights existing map
    /// points first. Only input points at least `min_dist_new_point` from
    /// the map are appended. The merged cloud is passed through
    /// `post_filters` in the sensor frame and republished.
    pub fn update_scan(
        &self,
        mut input: PointCloud,
        pose: &Pose,
        post_filters: &[Box<dyn ScanFilter>],
    ) -> Result<()> {
        let config = &self.shared.config;
        if config.compute_prob_dynamic {
            input.set_probability_dynamic(vec![config.prior_dynamic; input.len()]);
        }

        let mut local = self.shared.local_cloud.lock();
        if self.shared.cloud_empty.load(Ordering::Acquire) {
            local.cloud = input;
        } else {
            if config.compute_prob_dynamic {
                dynamic::update_dynamic_probabilities(&input, &mut local.cloud, pose, config)?;
            }
            let fresh = points_beyond_min_dist(&input, &local.cloud, config.min_dist_new_point);
            local.cloud.concatenate(&fresh);
        }

        let mut in_sensor_frame = local.cloud.transformed(&pose.inverse());
        for filter in post_filters {
            filter.apply(&mut in_sensor_frame);
        }
        local.cloud = in_sensor_frame.transformed(pose);

        self.shared.publish(&local.cloud);
        self.shared
            .cloud_empty
            .store(local.cloud.is_empty(), Ordering::Release);
        self.shared
            .new_cloud_available
            .store(true, Ordering::Release);
        Ok(())
    }

    /// A deep copy of the active cloud.
    pub fn local_point_cloud(&self) -> PointCloud {
        self.shared.local_cloud.lock().cloud.clone()
    }

    /// The active cloud, if it changed since the last call. Clears the
    /// change flag.
    pub fn take_new_local_point_cloud(&self) -> Option<PointCloud> {
        let local = self.shared.local_cloud.lock();
        if self.shared.new_cloud_available.swap(false, Ordering::AcqRel) {
            Some(local.cloud.clone())
        } else {
            None
        }
    }

    /// Everything the map knows: the active cloud plus every stored cell,
    /// each point annotated with its cell depth in the `depths` column.
    pub fn global_point_cloud(&self) -> Result<PointCloud> {
        let (mut global, loaded_cells) = {
            let local = self.shared.local_cloud.lock();
            (local.cloud.clone(), local.loaded_cells.clone())
        };

        let cell_depths: HashMap<GridCoord, i32> = loaded_cells
            .iter()
            .map(|info| (info.coord(), info.depth))
            .collect();
        let mut depths = Vec::with_capacity(global.len());
        for i in 0..global.len() {
            let coord = self.point_coord(&global, i);
            depths.push(cell_depths.get(&coord).copied().unwrap_or(0));
        }
        global.set_depths(depths);

        let stored_infos = self.shared.store.lock().all_cell_infos()?;
        for stored in stored_infos {
            if loaded_cells.contains(&stored) {
                continue;
            }
            // Retrieval removes the cell; put it straight back so reading
            // the global cloud leaves the store unchanged.
            let (info, mut points) = self.shared.store.lock().retrieve_cell(
                stored.row,
                stored.column,
                stored.aisle,
                stored.depth,
            )?;
            self.shared.store.lock().save_cell(info, &points)?;
            points.set_depths(vec![info.depth; points.len()]);
            global.concatenate(&points);
        }
        Ok(global)
    }

    /// Replace the active cloud wholesale and rearm the first-pose flush so
    /// the next pose update rebuckets the seeded points.
    ///
    /// Fails with a configuration error when dynamic-probability updates
    /// are enabled but the cloud carries no normals; the map is unchanged.
    pub fn set_global_point_cloud(&self, cloud: PointCloud) -> Result<()> {
        if self.shared.config.compute_prob_dynamic && !cloud.has_normals() {
            return Err(Error::Config(
                "dynamic-probability updates need a normals column on the map cloud".into(),
            ));
        }

        let mut local = self.shared.local_cloud.lock();
        local.cloud = cloud;
        self.shared.publish(&local.cloud);
        self.shared
            .cloud_empty
            .store(local.cloud.is_empty(), Ordering::Release);
        self.shared.first_pose_update.store(true, Ordering::Release);
        Ok(())
    }

    /// Whether the active cloud holds no points.
    pub fn is_local_point_cloud_empty(&self) -> bool {
        self.shared.cloud_empty.load(Ordering::Acquire)
    }

    /// Whether scheduled cell jobs are still waiting for the worker.
    /// Always false offline.
    pub fn has_pending_updates(&self) -> bool {
        self.shared.pending_updates.load(Ordering::SeqCst) > 0
    }

    /// Identities of the currently loaded cells.
    pub fn loaded_cell_infos(&self) -> HashSet<CellInfo> {
        self.shared.local_cloud.lock().loaded_cells.clone()
    }

    fn point_coord(&self, cloud: &PointCloud, index: usize) -> GridCoord {
        let geometry = &self.shared.geometry;
        let p = cloud.point(index);
        GridCoord::new(
            geometry.to_grid(p[0]),
            geometry.to_grid(p[1]),
            if self.shared.config.is_3d {
                geometry.to_grid(p[2])
            } else {
                0
            },
        )
    }
}

/// Input points whose nearest map neighbor is at least `min_dist` away.
/// The `>=` comparison means a point at exactly `min_dist` is kept.
fn points_beyond_min_dist(input: &PointCloud, map: &PointCloud, min_dist: f32) -> PointCloud {
    let mut tree: KdTree<f32, 3> = KdTree::new();
    for i in 0..map.len() {
        tree.add(&map.point(i), i as u64);
    }

    let min_dist_sq = min_dist * min_dist;
    let mut kept = input.similar_empty();
    for i in 0..input.len() {
        let nearest = tree.nearest_one::<SquaredEuclidean>(&input.point(i));
        if nearest.distance >= min_dist_sq {
            kept.push_from(input, i);
        }
    }
    kept
}
