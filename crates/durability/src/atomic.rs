//! Crash-safe single-document writer
//!
//! Uses the write-fsync-rename pattern so a document file is only ever
//! replaced as a whole.
//!
//! # Crash Safety
//!
//! A write follows this sequence:
//! 1. Create the parent directory if needed
//! 2. Copy the current target to a sidecar backup (`.<name>.<uuid>.bak`)
//! 3. Write the payload to a temp file in the same directory and fsync it
//! 4. Optionally verify the temp file's MD5 against the payload's MD5
//! 5. Atomically rename the temp file over the target (commit point)
//! 6. Fsync the parent directory (best effort)
//! 7. Delete the sidecar backup
//!
//! Before step 5 the target is untouched; after it the target holds the new
//! content in full. A failure before the commit point removes the temp
//! file. A failure after it copies the sidecar backup back over the target.
//! Readers never observe a partially written target because only a rename
//! changes what the target path resolves to.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use docvault_core::VaultCounters;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::checksum::{md5_file, md5_hex};
use crate::error::WriteError;
use crate::fsutil::{backup_path_for, parent_dir, remove_if_exists, sync_dir, sync_file, temp_path_for};
use crate::hook::{NoopHook, WriteHook, WriteStage};

/// Per-write options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Copy the existing target to a sidecar before overwriting it.
    pub backup: bool,
    /// Compare the temp file's checksum with the payload before renaming.
    pub verify: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            backup: true,
            verify: false,
        }
    }
}

impl WriteOptions {
    /// Set sidecar backup
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    /// Set verification
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

/// Outcome of a committed write.
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// Target that now holds the payload.
    pub path: PathBuf,
    /// Payload size
    pub bytes_written: u64,
    /// MD5 of the payload, when verification ran.
    pub checksum: Option<String>,
    /// Whether a sidecar backup protected the write.
    pub backed_up: bool,
    /// Wall time of the write.
    pub duration: Duration,
}

/// A committed write whose sidecar backup was kept for a caller-level
/// rollback.
#[derive(Debug)]
pub(crate) struct RetainedWrite {
    pub result: WriteResult,
    pub backup: Option<PathBuf>,
}

/// Atomic document writer.
///
/// The writer is stateless apart from its hook and counters, so one
/// instance is shared by every caller. Writers of the same target must be
/// serialized by the caller; the rename keeps unrelated targets safe.
pub struct AtomicWriter {
    hook: Arc<dyn WriteHook>,
    counters: Arc<VaultCounters>,
}

impl Default for AtomicWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicWriter {
    /// Create a writer with no hook and private counters.
    pub fn new() -> Self {
        AtomicWriter {
            hook: Arc::new(NoopHook),
            counters: Arc::new(VaultCounters::new()),
        }
    }

    /// Install a write-stage hook
    pub fn with_hook(mut self, hook: Arc<dyn WriteHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Report into shared counters
    pub fn with_counters(mut self, counters: Arc<VaultCounters>) -> Self {
        self.counters = counters;
        self
    }

    /// Counters this writer reports into.
    pub fn counters(&self) -> &Arc<VaultCounters> {
        &self.counters
    }

    /// Serialize `payload` as pretty-printed JSON and write it atomically.
    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        target: &Path,
        payload: &T,
        options: WriteOptions,
    ) -> Result<WriteResult, WriteError> {
        let bytes = to_json_bytes(target, payload)?;
        self.write_bytes(target, &bytes, options)
    }

    /// Write raw bytes atomically
    pub fn write_bytes(
        &self,
        target: &Path,
        payload: &[u8],
        options: WriteOptions,
    ) -> Result<WriteResult, WriteError> {
        self.write_inner(target, payload, options, false)
            .map(|retained| retained.result)
    }

    /// Write atomically but keep the sidecar backup on success.
    ///
    /// The caller owns the returned backup and must either restore or
    /// delete it.
    pub(crate) fn write_retaining_backup(
        &self,
        target: &Path,
        payload: &[u8],
        options: WriteOptions,
    ) -> Result<RetainedWrite, WriteError> {
        self.write_inner(target, payload, options, true)
    }

    /// Atomically replace `target` with the content of `backup`.
    ///
    /// The backup is copied to a temp file and renamed over the target, so
    /// a rollback is itself all-or-nothing. The backup file is left in
    /// place.
    pub fn restore_from_backup(&self, backup: &Path, target: &Path) -> Result<(), WriteError> {
        self.hook
            .on_stage(WriteStage::RollbackRestore, target)
            .map_err(WriteError::io(WriteStage::RollbackRestore.name(), target))?;

        let temp = temp_path_for(target);
        let result = (|| {
            fs::copy(backup, &temp).map_err(WriteError::io("copy backup", &temp))?;
            sync_file(&temp).map_err(WriteError::io("fsync temp", &temp))?;
            fs::rename(&temp, target).map_err(WriteError::io("rename", target))?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                if let Err(e) = sync_dir(parent_dir(target)) {
                    warn!(target: "docvault::atomic", path = %target.display(), error = %e, "Directory fsync failed after restore");
                }
                debug!(target: "docvault::atomic", path = %target.display(), "Restored target from sidecar backup");
                Ok(())
            }
            Err(e) => {
                let _ = remove_if_exists(&temp);
                Err(e)
            }
        }
    }

    fn write_inner(
        &self,
        target: &Path,
        payload: &[u8],
        options: WriteOptions,
        retain_backup: bool,
    ) -> Result<RetainedWrite, WriteError> {
        let start = Instant::now();

        let result = self.write_steps(target, payload, options, retain_backup, start);
        match &result {
            Ok(retained) => self.counters.record_write(retained.result.bytes_written),
            Err(e) => self.counters.record_write_failure(e.is_integrity()),
        }
        result
    }

    fn write_steps(
        &self,
        target: &Path,
        payload: &[u8],
        options: WriteOptions,
        retain_backup: bool,
        start: Instant,
    ) -> Result<RetainedWrite, WriteError> {
        // Step 1: parent directory
        let dir = parent_dir(target);
        fs::create_dir_all(dir).map_err(WriteError::io("create parent dir", dir))?;

        // Step 2: sidecar backup
        let existed = target.exists();
        let backup = if options.backup && existed {
            Some(self.create_backup(target, options.verify)?)
        } else {
            None
        };

        // Steps 3-6
        let temp = temp_path_for(target);
        let mut committed = false;
        let staged = self.stage_and_commit(target, &temp, payload, options, &mut committed);

        let checksum = match staged {
            Ok(checksum) => checksum,
            Err(e) => {
                if let Err(cleanup) = remove_if_exists(&temp) {
                    warn!(target: "docvault::atomic", temp = %temp.display(), error = %cleanup, "Failed to remove temp file");
                }
                if committed || backup.is_some() {
                    self.rollback_single(target, backup.as_deref(), existed, committed);
                }
                debug!(target: "docvault::atomic", path = %target.display(), error = %e, committed, "Atomic write failed");
                return Err(e);
            }
        };

        // Step 7: drop the sidecar unless the caller keeps it for rollback
        let backed_up = backup.is_some();
        let backup = match backup {
            Some(path) if !retain_backup => {
                if let Err(e) = remove_if_exists(&path) {
                    warn!(target: "docvault::atomic", backup = %path.display(), error = %e, "Failed to remove sidecar backup");
                }
                None
            }
            other => other,
        };

        let result = WriteResult {
            path: target.to_path_buf(),
            bytes_written: payload.len() as u64,
            checksum,
            backed_up,
            duration: start.elapsed(),
        };
        debug!(target: "docvault::atomic", path = %target.display(), bytes = result.bytes_written, "Atomic write committed");

        Ok(RetainedWrite { result, backup })
    }

    fn create_backup(&self, target: &Path, verify: bool) -> Result<PathBuf, WriteError> {
        let backup = backup_path_for(target);

        let result = (|| {
            fs::copy(target, &backup).map_err(WriteError::io("copy to backup", &backup))?;
            sync_file(&backup).map_err(WriteError::io("fsync backup", &backup))?;

            if verify {
                let expected = md5_file(target).map_err(WriteError::io("checksum target", target))?;
                let actual = md5_file(&backup).map_err(WriteError::io("checksum backup", &backup))?;
                if expected != actual {
                    return Err(WriteError::Integrity {
                        path: backup.clone(),
                        expected,
                        actual,
                    });
                }
            }

            self.hook
                .on_stage(WriteStage::BackupCreated, &backup)
                .map_err(WriteError::io(WriteStage::BackupCreated.name(), &backup))
        })();

        match result {
            Ok(()) => Ok(backup),
            Err(e) => {
                let _ = remove_if_exists(&backup);
                Err(e)
            }
        }
    }

    fn stage_and_commit(
        &self,
        target: &Path,
        temp: &Path,
        payload: &[u8],
        options: WriteOptions,
        committed: &mut bool,
    ) -> Result<Option<String>, WriteError> {
        // Step 3: temp file in the target's directory
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp)
            .map_err(WriteError::io("create temp", temp))?;
        file.write_all(payload)
            .map_err(WriteError::io("write temp", temp))?;
        file.sync_all().map_err(WriteError::io("fsync temp", temp))?;
        drop(file);

        self.hook
            .on_stage(WriteStage::TempWritten, temp)
            .map_err(WriteError::io(WriteStage::TempWritten.name(), temp))?;

        // Step 4: verify what actually reached the disk
        let checksum = if options.verify {
            let expected = md5_hex(payload);
            let actual = md5_file(temp).map_err(WriteError::io("checksum temp", temp))?;
            if expected != actual {
                return Err(WriteError::Integrity {
                    path: target.to_path_buf(),
                    expected,
                    actual,
                });
            }
            Some(expected)
        } else {
            None
        };

        // Step 5: commit point
        fs::rename(temp, target).map_err(WriteError::io("rename", target))?;
        *committed = true;

        // Step 6: best effort
        if let Err(e) = sync_dir(parent_dir(target)) {
            warn!(target: "docvault::atomic", path = %target.display(), error = %e, "Directory fsync failed");
        }

        self.hook
            .on_stage(WriteStage::Committed, target)
            .map_err(WriteError::io(WriteStage::Committed.name(), target))?;

        Ok(checksum)
    }

    /// Undo a failed single write.
    ///
    /// The target is untouched until the rename, so only a failure after the
    /// commit point needs undoing: the backup is copied back, or the target
    /// is removed when the write created it.
    fn rollback_single(&self, target: &Path, backup: Option<&Path>, existed: bool, committed: bool) {
        if committed {
            let undone = match backup {
                Some(backup) => self.restore_from_backup(backup, target),
                None if !existed => remove_if_exists(target).map_err(WriteError::io("remove new target", target)),
                None => {
                    warn!(
                        target: "docvault::atomic",
                        path = %target.display(),
                        "Write failed after commit without a backup; new content kept"
                    );
                    Ok(())
                }
            };
            if let Err(e) = undone {
                error!(
                    target: "docvault::atomic",
                    path = %target.display(),
                    backup = ?backup.map(|b| b.display().to_string()),
                    error = %e,
                    "Failed to undo target after write failure; sidecar backup kept"
                );
                return;
            }
            if backup.is_none() {
                if let Err(e) = sync_dir(parent_dir(target)) {
                    warn!(target: "docvault::atomic", path = %target.display(), error = %e, "Directory fsync failed after removal");
                }
            }
        }
        if let Some(backup) = backup {
            if let Err(e) = remove_if_exists(backup) {
                warn!(target: "docvault::atomic", backup = %backup.display(), error = %e, "Failed to remove sidecar backup");
            }
        }
    }
}

/// Pretty-printed JSON encoding used for every document.
pub fn to_json_bytes<T: Serialize + ?Sized>(target: &Path, payload: &T) -> Result<Vec<u8>, WriteError> {
    serde_json::to_vec_pretty(payload).map_err(|source| WriteError::Serialize {
        path: target.to_path_buf(),
        source,
    })
}
