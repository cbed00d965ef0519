//! Snapshot restore
//!
//! Restore runs in two phases. Validation touches nothing on disk:
//!
//! 1. The caller's [`RestoreConfirmation`] must name the requested snapshot
//! 2. The identifier must parse as a [`SnapshotId`]
//! 3. No other maintenance operation may be running
//! 4. The snapshot must be ledgered, and every ledger entry must map to an
//!    allow-listed document
//!
//! Only then are archives decoded and written back through the document
//! store, each write taking a sidecar backup.
//!
//! In [`RestoreMode::Independent`] documents are restored one at a time and
//! a failure leaves earlier documents restored; the error lists them. In
//! [`RestoreMode::Atomic`] every archive is decoded and checksummed first,
//! then all documents are written as one batch.

use std::sync::Arc;
use std::time::Instant;

use docvault_core::{DocumentName, RestoreMode, VaultEvent};
use tracing::{debug, info, warn};

use crate::error::RestoreError;
use crate::id::SnapshotId;
use crate::ledger::Snapshot;
use crate::manager::SnapshotManager;

/// Explicit operator confirmation for a restore.
///
/// The administrative surface obtains this out of band (a typed
/// confirmation, a second request) and hands it to the engine. A
/// confirmation only authorizes the snapshot it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreConfirmation {
    snapshot_id: String,
}

impl RestoreConfirmation {
    /// Confirm restoring `snapshot_id`
    pub fn for_snapshot(snapshot_id: impl Into<String>) -> Self {
        RestoreConfirmation {
            snapshot_id: snapshot_id.into(),
        }
    }

    /// Snapshot this confirmation authorizes
    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }
}

/// Outcome of a successful restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// Restored snapshot
    pub snapshot_id: SnapshotId,
    /// Documents written back, in restore order.
    pub documents: Vec<DocumentName>,
    /// Wall time of the restore.
    pub duration_ms: u64,
}

/// Writes snapshot content back into the document store.
pub struct RestoreEngine {
    manager: Arc<SnapshotManager>,
    mode: RestoreMode,
}

impl RestoreEngine {
    /// Create an engine restoring snapshots of `manager`.
    pub fn new(manager: Arc<SnapshotManager>) -> Self {
        RestoreEngine {
            manager,
            mode: RestoreMode::default(),
        }
    }

    /// Set how multi-document restores handle failure.
    pub fn with_mode(mut self, mode: RestoreMode) -> Self {
        self.mode = mode;
        self
    }

    /// Configured restore mode
    pub fn mode(&self) -> RestoreMode {
        self.mode
    }

    /// Restore every document recorded in snapshot `id`.
    pub fn restore(&self, id: &str, confirmation: &RestoreConfirmation) -> Result<RestoreReport, RestoreError> {
        if confirmation.snapshot_id() != id {
            return Err(RestoreError::ConfirmationMismatch {
                requested: id.to_string(),
                confirmed: confirmation.snapshot_id().to_string(),
            });
        }
        let id = SnapshotId::parse(id)?;

        let counters = self.manager.store().writer().counters();
        let result = self.restore_validated(&id);
        match &result {
            Ok(report) => {
                counters.record_restore(true);
                info!(
                    target: "docvault::restore",
                    snapshot = %id,
                    documents = report.documents.len(),
                    duration_ms = report.duration_ms,
                    mode = ?self.mode,
                    "Snapshot restored"
                );
                self.manager.store().events().publish(VaultEvent::SnapshotRestored {
                    snapshot_id: id.to_string(),
                    documents: report.documents.clone(),
                });
            }
            Err(e) if e.is_validation() => {
                warn!(target: "docvault::restore", snapshot = %id, error = %e, "Restore refused");
            }
            Err(e) => {
                counters.record_restore(false);
                warn!(
                    target: "docvault::restore",
                    snapshot = %id,
                    error = %e,
                    restored = ?e.restored(),
                    "Restore failed"
                );
            }
        }
        result
    }

    fn restore_validated(&self, id: &SnapshotId) -> Result<RestoreReport, RestoreError> {
        let start = Instant::now();
        let _guard = self.manager.lock().try_acquire("restore")?;

        let snapshot = self
            .manager
            .get_snapshot(id.as_str())
            .map_err(|_| RestoreError::NotFound { id: id.to_string() })?;
        let targets = snapshot
            .trusted_documents()
            .map_err(|entry| RestoreError::UntrustedFileReference {
                id: id.to_string(),
                entry: entry.archive.clone(),
            })?;

        let documents = match self.mode {
            RestoreMode::Independent => self.restore_independent(&snapshot, &targets)?,
            RestoreMode::Atomic => self.restore_atomic(&snapshot, &targets)?,
        };

        Ok(RestoreReport {
            snapshot_id: id.clone(),
            documents,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn restore_independent(
        &self,
        snapshot: &Snapshot,
        targets: &[DocumentName],
    ) -> Result<Vec<DocumentName>, RestoreError> {
        let store = self.manager.store();
        let mut restored = Vec::with_capacity(targets.len());

        for (file, &document) in snapshot.files.iter().zip(targets) {
            let outcome = self
                .manager
                .read_archive(snapshot, file)
                .and_then(|(_, content)| Ok(store.write_bytes(document, &content)?));

            if let Err(source) = outcome {
                return Err(RestoreError::Document {
                    id: snapshot.id.to_string(),
                    document,
                    restored,
                    source: Box::new(source),
                });
            }
            debug!(target: "docvault::restore", snapshot = %snapshot.id, document = %document, "Restored document");
            restored.push(document);
        }
        Ok(restored)
    }

    fn restore_atomic(
        &self,
        snapshot: &Snapshot,
        targets: &[DocumentName],
    ) -> Result<Vec<DocumentName>, RestoreError> {
        let store = self.manager.store();
        let mut batch = store.batch();

        for (file, &document) in snapshot.files.iter().zip(targets) {
            let (_, content) = self
                .manager
                .read_archive(snapshot, file)
                .map_err(|source| RestoreError::Document {
                    id: snapshot.id.to_string(),
                    document,
                    restored: Vec::new(),
                    source: Box::new(source),
                })?;
            batch.put_bytes(document, content);
        }

        batch.commit().map_err(|source| RestoreError::Batch {
            id: snapshot.id.to_string(),
            source,
        })?;
        Ok(targets.to_vec())
    }
}
