//! Operation counters
//!
//! Side-channel counters for the metrics layer. They accumulate over the
//! lifetime of a vault and are never reset; the metrics exporter reads
//! them through [`VaultCounters::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by all components
#[derive(Debug, Default)]
pub struct VaultCounters {
    writes: AtomicU64,
    write_failures: AtomicU64,
    integrity_failures: AtomicU64,
    bytes_written: AtomicU64,
    batches_committed: AtomicU64,
    batches_rolled_back: AtomicU64,
    snapshots_created: AtomicU64,
    snapshots_failed: AtomicU64,
    snapshots_pruned: AtomicU64,
    restores: AtomicU64,
    restore_failures: AtomicU64,
}

/// Point-in-time copy of [`VaultCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Committed document writes; snapshot archives use their own writer
    pub writes: u64,
    /// Atomic writes that failed (any stage)
    pub write_failures: u64,
    /// Writes rejected by checksum verification
    pub integrity_failures: u64,
    /// Payload bytes committed
    pub bytes_written: u64,
    /// Batches fully applied
    pub batches_committed: u64,
    /// Batches reverted after a member failure
    pub batches_rolled_back: u64,
    /// Snapshots added to the ledger
    pub snapshots_created: u64,
    /// Snapshot attempts that failed
    pub snapshots_failed: u64,
    /// Snapshots removed by retention or deletion
    pub snapshots_pruned: u64,
    /// Successful restores
    pub restores: u64,
    /// Failed restores
    pub restore_failures: u64,
}

impl VaultCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed write of `bytes` bytes
    pub fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a failed write
    pub fn record_write_failure(&self, integrity: bool) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
        if integrity {
            self.integrity_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a batch outcome
    pub fn record_batch(&self, committed: bool) {
        if committed {
            self.batches_committed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.batches_rolled_back.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a snapshot attempt
    pub fn record_snapshot(&self, created: bool) {
        if created {
            self.snapshots_created.fetch_add(1, Ordering::Relaxed);
        } else {
            self.snapshots_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record pruned snapshots
    pub fn record_pruned(&self, count: u64) {
        self.snapshots_pruned.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a restore attempt
    pub fn record_restore(&self, succeeded: bool) {
        if succeeded {
            self.restores.fetch_add(1, Ordering::Relaxed);
        } else {
            self.restore_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Copy the current values
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            integrity_failures: self.integrity_failures.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            batches_rolled_back: self.batches_rolled_back.load(Ordering::Relaxed),
            snapshots_created: self.snapshots_created.load(Ordering::Relaxed),
            snapshots_failed: self.snapshots_failed.load(Ordering::Relaxed),
            snapshots_pruned: self.snapshots_pruned.load(Ordering::Relaxed),
            restores: self.restores.load(Ordering::Relaxed),
            restore_failures: self.restore_failures.load(Ordering::Relaxed),
        }
    }
}
