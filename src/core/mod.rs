//! Fundamental types: grid geometry, cell identities, point clouds, poses.

pub mod cell;
pub mod grid;
pub mod point_cloud;
pub mod pose;

pub use cell::{CellInfo, Update};
pub use grid::{ordered_indexes, GridCoord, GridGeometry};
pub use point_cloud::PointCloud;
pub use pose::Pose;
