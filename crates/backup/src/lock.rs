//! In-process maintenance lock
//!
//! Snapshot creation, pruning, deletion, garbage collection and restore all
//! touch the backups directory or the documents as multi-step sequences.
//! Only one of them may run at a time. Exactly one process owns the data
//! directory, so an in-process flag is sufficient.
//!
//! Acquisition never blocks: a scheduled snapshot that collides with an
//! administrative restore is skipped, and a restore that collides with a
//! snapshot is refused so the operator can retry.

use parking_lot::Mutex;

/// Another maintenance operation holds the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Cannot start {requested}: {running} is in progress")]
pub struct Busy {
    /// Operation holding the lock
    pub running: &'static str,
    /// Operation that was refused
    pub requested: &'static str,
}

/// Mutual exclusion between snapshot and restore operations
#[derive(Debug, Default)]
pub struct MaintenanceLock {
    running: Mutex<Option<&'static str>>,
}

impl MaintenanceLock {
    /// Create an unheld lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `operation`, or fail immediately
    pub fn try_acquire(&self, operation: &'static str) -> Result<MaintenanceGuard<'_>, Busy> {
        let mut running = self.running.lock();
        match *running {
            Some(current) => Err(Busy {
                running: current,
                requested: operation,
            }),
            None => {
                *running = Some(operation);
                Ok(MaintenanceGuard { lock: self })
            }
        }
    }

    /// Operation currently holding the lock
    pub fn current(&self) -> Option<&'static str> {
        *self.running.lock()
    }
}

/// Releases the [`MaintenanceLock`] on drop
#[derive(Debug)]
pub struct MaintenanceGuard<'a> {
    lock: &'a MaintenanceLock,
}

impl Drop for MaintenanceGuard<'_> {
    fn drop(&mut self) {
        *self.lock.running.lock() = None;
    }
}
