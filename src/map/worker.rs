//! Background cell-update worker.
//!
//! A single dedicated thread consumes the job queue in FIFO order. The
//! scheduler emits at most six jobs per pose update, so no reordering is
//! needed. Shutdown flips the stop flag and joins; the in-flight job
//! completes, jobs still queued are discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::core::Update;
use crate::error::Result;

use super::MapShared;

/// How long the worker waits on the queue before rechecking the stop flag.
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Handle to the update thread. Stops and joins on drop.
pub(crate) struct UpdateWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl UpdateWorker {
    /// Spawn the worker over the shared map state and the job queue.
    pub fn spawn(shared: Arc<MapShared>, receiver: Receiver<Update>) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("map-cell-update".into())
            .spawn(move || worker_loop(shared, receiver, flag))?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the worker and wait for it to finish its current job.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Cell-update worker panicked");
            }
        }
    }
}

impl Drop for UpdateWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(shared: Arc<MapShared>, receiver: Receiver<Update>, running: Arc<AtomicBool>) {
    log::debug!("Cell-update worker started");
    while running.load(Ordering::Acquire) {
        match receiver.recv_timeout(QUEUE_POLL_INTERVAL) {
            Ok(update) => {
                log::debug!(
                    "Applying cell {}: rows [{}, {}], columns [{}, {}]",
                    if update.load { "load" } else { "unload" },
                    update.start_row,
                    update.end_row,
                    update.start_column,
                    update.end_column,
                );
                if let Err(error) = shared.apply_update(&update) {
                    log::error!("Cell update failed: {}", error);
                }
                shared.pending_updates.fetch_sub(1, Ordering::SeqCst);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    log::debug!("Cell-update worker stopped");
}
