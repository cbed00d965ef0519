//! Periodic snapshot scheduler
//!
//! A single named thread wakes every `interval` and takes a snapshot. The
//! wait is a condvar timeout, so [`SnapshotScheduler::shutdown`] returns as
//! soon as the current tick (if any) finishes instead of sleeping out the
//! interval.
//!
//! The scheduler never runs two snapshots at once: a tick that finds the
//! maintenance lock held (a restore, or an administrative snapshot) is
//! skipped.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::error::SnapshotError;
use crate::ledger::Snapshot;
use crate::manager::SnapshotManager;

/// Scheduler thread name
pub const SCHEDULER_THREAD_NAME: &str = "docvault-backup";

struct Shared {
    stop: Mutex<bool>,
    wake: Condvar,
    ticks: AtomicU64,
    skipped: AtomicU64,
}

/// Background thread taking snapshots at a fixed interval
pub struct SnapshotScheduler {
    manager: Arc<SnapshotManager>,
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    interval: Duration,
    snapshot_on_shutdown: bool,
    shut_down: AtomicBool,
}

impl SnapshotScheduler {
    /// Spawn the scheduler thread.
    ///
    /// The first snapshot is taken one `interval` after start.
    pub fn start(manager: Arc<SnapshotManager>, interval: Duration) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            stop: Mutex::new(false),
            wake: Condvar::new(),
            ticks: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        });

        let handle = {
            let manager = Arc::clone(&manager);
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(SCHEDULER_THREAD_NAME.to_string())
                .spawn(move || run(&manager, &shared, interval))?
        };
        info!(target: "docvault::scheduler", interval_secs = interval.as_secs(), "Snapshot scheduler started");

        Ok(SnapshotScheduler {
            manager,
            shared,
            thread: Mutex::new(Some(handle)),
            interval,
            snapshot_on_shutdown: false,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Take a final snapshot during [`shutdown`](Self::shutdown)
    pub fn with_snapshot_on_shutdown(mut self, enabled: bool) -> Self {
        self.snapshot_on_shutdown = enabled;
        self
    }

    /// Interval between ticks
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticks that attempted a snapshot
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    /// Ticks skipped because the maintenance lock was held
    pub fn skipped(&self) -> u64 {
        self.shared.skipped.load(Ordering::Relaxed)
    }

    /// Stop the thread and, if configured, take a final snapshot.
    ///
    /// Idempotent: only the first call does anything. Returns the final
    /// snapshot when one was taken.
    pub fn shutdown(&self) -> Result<Option<Snapshot>, SnapshotError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        self.stop_thread();

        if !self.snapshot_on_shutdown {
            info!(target: "docvault::scheduler", "Snapshot scheduler stopped");
            return Ok(None);
        }
        let snapshot = self.manager.create_snapshot()?;
        info!(target: "docvault::scheduler", snapshot = %snapshot.id, "Snapshot scheduler stopped after final snapshot");
        Ok(Some(snapshot))
    }

    fn stop_thread(&self) {
        {
            let mut stop = self.shared.stop.lock();
            *stop = true;
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                warn!(target: "docvault::scheduler", "Snapshot scheduler thread panicked");
            }
        }
    }
}

impl Drop for SnapshotScheduler {
    fn drop(&mut self) {
        // Dropping without shutdown() stops the thread but skips the final
        // snapshot.
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            self.stop_thread();
        }
    }
}

fn run(manager: &SnapshotManager, shared: &Shared, interval: Duration) {
    loop {
        {
            let deadline = Instant::now() + interval;
            let mut stop = shared.stop.lock();
            while !*stop && Instant::now() < deadline {
                shared.wake.wait_until(&mut stop, deadline);
            }
            if *stop {
                return;
            }
        }
        tick(manager, shared);
    }
}

fn tick(manager: &SnapshotManager, shared: &Shared) {
    shared.ticks.fetch_add(1, Ordering::Relaxed);
    match manager.create_snapshot() {
        Ok(snapshot) => {
            debug!(target: "docvault::scheduler", snapshot = %snapshot.id, "Scheduled snapshot taken");
        }
        Err(SnapshotError::Busy(busy)) => {
            shared.skipped.fetch_add(1, Ordering::Relaxed);
            info!(target: "docvault::scheduler", running = busy.running, "Skipped scheduled snapshot");
        }
        Err(e) => {
            warn!(target: "docvault::scheduler", error = %e, "Scheduled snapshot failed");
        }
    }
}
