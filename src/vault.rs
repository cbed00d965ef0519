//! The `DocVault` facade
//!
//! Owns every component for one data directory:
//!
//! ```text
//! <data_dir>/
//! ├── documents/   DocumentStore (workflows.json, store-state.json, sessions.json)
//! └── backups/     SnapshotManager (ledger.json, backup-*/)
//! ```
//!
//! Exactly one process may open a data directory at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use docvault_backup::{
    RestoreConfirmation, RestoreEngine, RestoreReport, RetentionPlan, Snapshot, SnapshotId,
    SnapshotManager, SnapshotScheduler, SnapshotStats,
};
use docvault_core::{
    Clock, CounterSnapshot, DocumentName, EventBus, SystemClock, VaultConfig, VaultCounters,
    VaultEvent,
};
use docvault_durability::{AtomicWriter, DocumentBatch, DocumentStore, WriteResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Crash-safe document persistence with snapshots
pub struct DocVault {
    config: VaultConfig,
    store: Arc<DocumentStore>,
    snapshots: Arc<SnapshotManager>,
    restore: RestoreEngine,
    scheduler: Option<SnapshotScheduler>,
    events: Arc<EventBus>,
    counters: Arc<VaultCounters>,
    shut_down: AtomicBool,
}

impl DocVault {
    /// Open the data directory described by `config`.
    ///
    /// Creates missing documents with their defaults, sweeps crash
    /// leftovers, loads the snapshot ledger, removes un-ledgered snapshot
    /// directories and starts the scheduler when enabled.
    pub fn open(config: VaultConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open with an explicit clock for snapshot identifiers and retention
    pub fn open_with_clock(config: VaultConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let counters = Arc::new(VaultCounters::new());
        let events = Arc::new(EventBus::new());
        let writer = Arc::new(AtomicWriter::new().with_counters(Arc::clone(&counters)));

        let store = DocumentStore::open(config.documents_dir(), writer)?
            .with_verify(config.verify_writes)
            .with_events(Arc::clone(&events));
        let store = Arc::new(store);

        let snapshots = SnapshotManager::open(config.backups_dir(), Arc::clone(&store), config.backup.clone())?
            .with_clock(clock)
            .with_verify(config.verify_writes);
        let snapshots = Arc::new(snapshots);
        snapshots.collect_garbage()?;

        let restore = RestoreEngine::new(Arc::clone(&snapshots)).with_mode(config.backup.restore_mode);

        let scheduler = if config.backup.enabled {
            let scheduler = SnapshotScheduler::start(Arc::clone(&snapshots), config.backup.interval)
                .map_err(Error::Scheduler)?
                .with_snapshot_on_shutdown(config.backup.snapshot_on_shutdown);
            Some(scheduler)
        } else {
            None
        };

        info!(
            target: "docvault::store",
            data_dir = %config.data_dir.display(),
            snapshots = snapshots.get_stats().count,
            scheduler = scheduler.is_some(),
            "Vault opened"
        );

        Ok(DocVault {
            config,
            store,
            snapshots,
            restore,
            scheduler,
            events,
            counters,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Configuration the vault was opened with
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Underlying document store
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Underlying snapshot manager
    pub fn snapshots(&self) -> &Arc<SnapshotManager> {
        &self.snapshots
    }

    /// Read a document as JSON
    pub fn read(&self, name: DocumentName) -> Result<Value> {
        Ok(self.store.read(name)?)
    }

    /// Read a document into `T`
    pub fn read_as<T: DeserializeOwned>(&self, name: DocumentName) -> Result<T> {
        Ok(self.store.read_as(name)?)
    }

    /// Atomically replace a document
    pub fn write<T: Serialize + ?Sized>(&self, name: DocumentName, value: &T) -> Result<WriteResult> {
        Ok(self.store.write(name, value)?)
    }

    /// Start an all-or-nothing multi-document update
    pub fn batch(&self) -> DocumentBatch<'_> {
        self.store.batch()
    }

    /// Snapshot every document now
    pub fn create_snapshot(&self) -> Result<Snapshot> {
        Ok(self.snapshots.create_snapshot()?)
    }

    /// Ledgered snapshots, newest first
    pub fn list_snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.list_snapshots()
    }

    /// One ledgered snapshot
    pub fn get_snapshot(&self, id: &str) -> Result<Snapshot> {
        Ok(self.snapshots.get_snapshot(id)?)
    }

    /// Delete a snapshot
    pub fn delete_snapshot(&self, id: &str) -> Result<Snapshot> {
        Ok(self.snapshots.delete_snapshot(id)?)
    }

    /// Check every archive of a snapshot against its checksum
    pub fn verify_snapshot(&self, id: &str) -> Result<Vec<DocumentName>> {
        Ok(self.snapshots.verify_snapshot(id)?)
    }

    /// Snapshot count, sizes and age range
    pub fn snapshot_stats(&self) -> SnapshotStats {
        self.snapshots.get_stats()
    }

    /// Run a retention pass outside of snapshot creation
    pub fn apply_retention(&self) -> Result<RetentionPlan> {
        Ok(self.snapshots.apply_retention()?)
    }

    /// Restore a snapshot the operator has confirmed
    pub fn restore(&self, id: &str, confirmation: &RestoreConfirmation) -> Result<RestoreReport> {
        Ok(self.restore.restore(id, confirmation)?)
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> Receiver<VaultEvent> {
        self.events.subscribe()
    }

    /// Current operation counters
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Stop background work and, if configured, take a final snapshot.
    ///
    /// Call from the process's signal handler. Idempotent; also run on
    /// drop. Documents stay readable and writable afterwards.
    pub fn shutdown(&self) -> Result<Option<SnapshotId>> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }

        let final_snapshot = match &self.scheduler {
            Some(scheduler) => scheduler.shutdown()?,
            None if self.config.backup.snapshot_on_shutdown => Some(self.snapshots.create_snapshot()?),
            None => None,
        };

        info!(
            target: "docvault::store",
            final_snapshot = ?final_snapshot.as_ref().map(|s| s.id.as_str()),
            "Vault shut down"
        );
        Ok(final_snapshot.map(|s| s.id))
    }
}

impl Drop for DocVault {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(target: "docvault::store", error = %e, "Shutdown during drop failed");
        }
    }
}
