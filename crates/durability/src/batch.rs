//! Multi-document transactions
//!
//! A [`BatchCoordinator`] applies several atomic writes as one logical
//! transaction. Each member is committed with the atomic writer in order,
//! keeping its sidecar backup. If a member fails, every member committed
//! earlier in the same batch is reverted from its backup (or removed, if the
//! target did not exist before the batch), newest first. Readers see the
//! batch either fully applied or fully reverted.
//!
//! Members always take a sidecar backup regardless of their own options:
//! the backup is what makes the batch revertible.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::atomic::{to_json_bytes, AtomicWriter, WriteOptions, WriteResult};
use crate::error::{BatchError, RollbackFailure, WriteError};
use crate::fsutil::remove_if_exists;

struct PendingWrite {
    path: PathBuf,
    payload: Vec<u8>,
    options: WriteOptions,
}

struct CommittedMember {
    path: PathBuf,
    backup: Option<PathBuf>,
}

/// Outcome of a committed batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Per-member results, in commit order.
    pub writes: Vec<WriteResult>,
    /// Wall time of the whole batch.
    pub duration: Duration,
}

/// Accumulates writes and commits them all-or-nothing.
///
/// Concurrent batches touching the same files must be serialized by the
/// caller.
pub struct BatchCoordinator<'w> {
    writer: &'w AtomicWriter,
    pending: Vec<PendingWrite>,
}

impl<'w> BatchCoordinator<'w> {
    /// Start an empty batch on `writer`.
    pub fn new(writer: &'w AtomicWriter) -> Self {
        BatchCoordinator {
            writer,
            pending: Vec::new(),
        }
    }

    /// Queue raw bytes for `path`.
    pub fn add_bytes(&mut self, path: impl Into<PathBuf>, payload: Vec<u8>, options: WriteOptions) -> &mut Self {
        self.pending.push(PendingWrite {
            path: path.into(),
            payload,
            options,
        });
        self
    }

    /// Queue a JSON value for `path`.
    ///
    /// The value is serialized immediately, so a serialization failure is
    /// reported here rather than in the middle of a commit.
    pub fn add<T: Serialize + ?Sized>(
        &mut self,
        path: impl Into<PathBuf>,
        payload: &T,
        options: WriteOptions,
    ) -> Result<&mut Self, WriteError> {
        let path = path.into();
        let bytes = to_json_bytes(&path, payload)?;
        Ok(self.add_bytes(path, bytes, options))
    }

    /// Number of queued writes
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Targets of the queued writes, in commit order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.pending.iter().map(|p| p.path.as_path())
    }

    /// Apply every queued write, or none of them.
    pub fn commit(self) -> Result<BatchResult, BatchError> {
        let start = Instant::now();
        let total = self.pending.len();
        let mut committed: Vec<CommittedMember> = Vec::with_capacity(total);
        let mut writes = Vec::with_capacity(total);

        for (index, entry) in self.pending.into_iter().enumerate() {
            let options = entry.options.with_backup(true);
            match self
                .writer
                .write_retaining_backup(&entry.path, &entry.payload, options)
            {
                Ok(retained) => {
                    debug!(target: "docvault::batch", index, path = %entry.path.display(), "Batch member committed");
                    committed.push(CommittedMember {
                        path: entry.path,
                        backup: retained.backup,
                    });
                    writes.push(retained.result);
                }
                Err(source) => {
                    let err = rollback(self.writer, committed, index, entry.path, source);
                    self.writer.counters().record_batch(false);
                    return Err(err);
                }
            }
        }

        for member in &committed {
            if let Some(backup) = &member.backup {
                if let Err(e) = remove_if_exists(backup) {
                    warn!(target: "docvault::batch", backup = %backup.display(), error = %e, "Failed to remove sidecar backup");
                }
            }
        }

        self.writer.counters().record_batch(true);
        info!(target: "docvault::batch", members = total, "Batch committed");

        Ok(BatchResult {
            writes,
            duration: start.elapsed(),
        })
    }
}

/// Revert every committed member, newest first.
///
/// Reverse order matters when the same path appears twice: the oldest
/// backup holds the pre-batch content and must be applied last.
fn rollback(
    writer: &AtomicWriter,
    committed: Vec<CommittedMember>,
    failed_at: usize,
    path: PathBuf,
    source: WriteError,
) -> BatchError {
    warn!(
        target: "docvault::batch",
        failed_at,
        path = %path.display(),
        error = %source,
        reverting = committed.len(),
        "Batch member failed, rolling back"
    );

    let reverted = committed.len();
    let mut failures = Vec::new();

    for member in committed.into_iter().rev() {
        let outcome = match &member.backup {
            Some(backup) => writer.restore_from_backup(backup, &member.path),
            None => remove_if_exists(&member.path).map_err(WriteError::io("remove new file", &member.path)),
        };

        match outcome {
            Ok(()) => {
                if let Some(backup) = &member.backup {
                    if let Err(e) = remove_if_exists(backup) {
                        warn!(target: "docvault::batch", backup = %backup.display(), error = %e, "Failed to remove sidecar backup");
                    }
                }
            }
            Err(error) => {
                error!(
                    target: "docvault::batch",
                    path = %member.path.display(),
                    error = %error,
                    "Batch rollback failed for member"
                );
                failures.push(RollbackFailure {
                    path: member.path,
                    backup: member.backup,
                    error,
                });
            }
        }
    }

    if failures.is_empty() {
        BatchError::Failed {
            failed_at,
            path,
            reverted,
            source,
        }
    } else {
        error!(
            target: "docvault::batch",
            failed_at,
            unreverted = failures.len(),
            "Batch rollback incomplete; data directory needs operator attention"
        );
        BatchError::Fatal {
            failed_at,
            path,
            source,
            rollback: failures,
        }
    }
}
