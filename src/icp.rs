//! Interface to the ICP registration consumer.
//!
//! The map does not run registration itself; it republishes the active cloud
//! to an external registrar after every mutation. The sink lives behind a
//! shared mutex so the registrar never observes a half-modified cloud, and
//! the map holds that mutex only across the republish call.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::PointCloud;

/// Consumer of the active cloud, typically an ICP registrar using it as the
/// reference map.
pub trait IcpSink: Send {
    /// Replace the reference cloud. Called after every mutation of the
    /// active cloud.
    fn set_reference_map(&mut self, map: &PointCloud);
}

/// Shared handle to an ICP sink; the mutex doubles as the externally-owned
/// map lock of the registrar.
pub type SharedIcpSink = Arc<Mutex<dyn IcpSink + Send>>;

/// Sink that records republications. Useful as a registration stand-in for
/// tests and benchmarks.
#[derive(Default)]
pub struct RecordingSink {
    /// How many times the reference map was replaced.
    pub republish_count: usize,
    /// Point count of the most recent reference map.
    pub last_point_count: usize,
}

impl RecordingSink {
    /// Create a sink with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh sink in the shared handle the map expects.
    pub fn shared() -> Arc<Mutex<RecordingSink>> {
        Arc::new(Mutex::new(Self::new()))
    }
}

impl IcpSink for RecordingSink {
    fn set_reference_map(&mut self, map: &PointCloud) {
        self.republish_count += 1;
        self.last_point_count = map.len();
    }
}
