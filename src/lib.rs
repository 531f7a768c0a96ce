//! # Gati-Map: Dynamic Spatial Map for LiDAR ICP SLAM
//!
//! A pose-centric sliding-window point-cloud map. As the sensor moves, grid
//! cells of points stream between an in-memory active cloud and a backing
//! [`CellStore`]; each mutation of the active cloud is republished to an
//! ICP registrar that consumes it as the reference map. Scan integration
//! appends genuinely new points and can maintain a per-point
//! dynamic-vs-static probability from a ray-visibility model.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gati_map::{DynamicMap, MapperConfig, PointCloud, Pose, RecordingSink};
//!
//! let config = MapperConfig {
//!     cell_size: 1.0,
//!     sensor_max_range: 10.0,
//!     is_3d: false,
//!     is_online: false,
//!     ..Default::default()
//! };
//! let icp = RecordingSink::shared();
//! let mut map = DynamicMap::new(config, icp).unwrap();
//!
//! map.update_pose(&Pose::from_2d(0.5, 0.5, 0.0)).unwrap();
//! let scan = PointCloud::from_points(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
//! map.update_scan(scan, &Pose::from_2d(0.5, 0.5, 0.0), &[]).unwrap();
//! assert!(!map.is_local_point_cloud_empty());
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: grid geometry, cell identities, point clouds, poses
//! - [`store`]: the [`CellStore`] trait and the RAM / on-disk stores
//! - [`map`]: the [`DynamicMap`] itself: cell cache, pose scheduler,
//!   update worker, dynamic-probability model
//! - [`icp`]: the sink the active cloud is republished to
//! - [`filters`]: post-integration scan filters
//!
//! ## Cell identity and depth
//!
//! Every cell carries an integer depth: the minimum Chebyshev distance (in
//! grid units) to any cell its points originated from, accumulated across
//! unload/load cycles. Depths survive eviction and reload, so a consumer of
//! the externalized map can judge how far points drifted from where they
//! were measured.

pub mod config;
pub mod core;
pub mod error;
pub mod filters;
pub mod icp;
pub mod map;
pub mod store;

pub use config::MapperConfig;
pub use core::{CellInfo, GridCoord, GridGeometry, PointCloud, Pose, Update};
pub use error::{Error, Result};
pub use filters::{MaxRangeFilter, ScanFilter};
pub use icp::{IcpSink, RecordingSink, SharedIcpSink};
pub use map::DynamicMap;
pub use store::{CellStore, DiskCellStore, RamCellStore};
