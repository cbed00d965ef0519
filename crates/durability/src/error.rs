//! Durability error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from a single atomic write
#[derive(Debug, Error)]
pub enum WriteError {
    /// Primitive file operation failed
    #[error("I/O error during {op} on {}: {source}", .path.display())]
    Io {
        /// Operation being attempted
        op: &'static str,
        /// Path the operation targeted
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Bytes on disk differ from the payload; nothing was renamed
    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    Integrity {
        /// File that failed verification
        path: PathBuf,
        /// Checksum of the in-memory payload
        expected: String,
        /// Checksum of the on-disk bytes
        actual: String,
    },

    /// Payload could not be serialized
    #[error("Failed to serialize payload for {}: {source}", .path.display())]
    Serialize {
        /// Intended target
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

impl WriteError {
    /// Build a closure mapping an `io::Error` into [`WriteError::Io`]
    pub fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> WriteError {
        let path = path.into();
        move |source| WriteError::Io { op, path, source }
    }

    /// Whether this is a checksum verification failure
    pub fn is_integrity(&self) -> bool {
        matches!(self, WriteError::Integrity { .. })
    }

    /// Path the failed operation targeted
    pub fn path(&self) -> &std::path::Path {
        match self {
            WriteError::Io { path, .. }
            | WriteError::Integrity { path, .. }
            | WriteError::Serialize { path, .. } => path,
        }
    }
}

/// A member whose rollback failed
#[derive(Debug)]
pub struct RollbackFailure {
    /// Target that could not be reverted
    pub path: PathBuf,
    /// Sidecar backup still holding its pre-batch content, if any
    pub backup: Option<PathBuf>,
    /// Why the revert failed
    pub error: WriteError,
}

/// Errors from a batch commit
#[derive(Debug, Error)]
pub enum BatchError {
    /// A member failed; every earlier member was reverted
    #[error("Batch write {failed_at} ({}) failed, {reverted} earlier write(s) rolled back: {source}", .path.display())]
    Failed {
        /// Index of the failing member
        failed_at: usize,
        /// Target of the failing member
        path: PathBuf,
        /// Earlier members reverted to their pre-batch content
        reverted: usize,
        /// Failure of the member
        #[source]
        source: WriteError,
    },

    /// A member failed and reverting earlier members also failed.
    ///
    /// The data directory may mix pre- and post-batch content and needs
    /// operator attention. The sidecar backups named in `rollback` are kept.
    #[error("Batch write {failed_at} ({}) failed and rollback failed for {} file(s): {source}", .path.display(), .rollback.len())]
    Fatal {
        /// Index of the failing member
        failed_at: usize,
        /// Target of the failing member
        path: PathBuf,
        /// Failure of the member
        #[source]
        source: WriteError,
        /// Members that could not be reverted
        rollback: Vec<RollbackFailure>,
    },
}

impl BatchError {
    /// Index of the member that failed
    pub fn failed_at(&self) -> usize {
        match self {
            BatchError::Failed { failed_at, .. } | BatchError::Fatal { failed_at, .. } => {
                *failed_at
            }
        }
    }

    /// Whether every earlier member was reverted
    pub fn rolled_back(&self) -> bool {
        matches!(self, BatchError::Failed { .. })
    }

    /// Whether operator intervention is required
    pub fn is_fatal(&self) -> bool {
        matches!(self, BatchError::Fatal { .. })
    }

    /// The member failure that aborted the batch
    pub fn member_error(&self) -> &WriteError {
        match self {
            BatchError::Failed { source, .. } | BatchError::Fatal { source, .. } => source,
        }
    }
}
