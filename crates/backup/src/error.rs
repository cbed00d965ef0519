//! Error types for snapshot and restore operations

use std::io;
use std::path::PathBuf;

use docvault_core::DocumentName;
use docvault_durability::{StoreError, WriteError};

use crate::codec::CodecError;
use crate::id::InvalidSnapshotId;
use crate::ledger::LedgerError;
use crate::lock::Busy;

/// Snapshot manager errors.
///
/// A failed snapshot creation is never ledgered; whatever it left in the
/// backups directory is invisible until garbage-collected.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The identifier is not a well-formed snapshot id
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidSnapshotId),

    /// No ledger entry has this identifier
    #[error("Snapshot not found: {id}")]
    NotFound {
        /// Requested identifier
        id: String,
    },

    /// Another maintenance operation is in progress
    #[error(transparent)]
    Busy(#[from] Busy),

    /// A filesystem operation failed
    #[error("Snapshot I/O error during {op} on {}: {source}", .path.display())]
    Io {
        /// Operation being performed
        op: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Reading the tracked documents failed
    #[error("Failed to read documents for snapshot: {0}")]
    Store(#[from] StoreError),

    /// Writing an archive or metadata file failed
    #[error("Failed to write snapshot file: {0}")]
    Write(#[from] WriteError),

    /// Compressing or decompressing an archive failed
    #[error("Archive {archive} of snapshot {id}: {source}")]
    Codec {
        /// Snapshot identifier
        id: String,
        /// Archive file name
        archive: String,
        /// Underlying error
        #[source]
        source: CodecError,
    },

    /// An archive's content does not match its recorded checksum
    #[error("Archive {archive} of snapshot {id} is corrupt: expected md5 {expected}, got {actual}")]
    Integrity {
        /// Snapshot identifier
        id: String,
        /// Archive file name
        archive: String,
        /// Recorded checksum
        expected: String,
        /// Checksum of the archive content
        actual: String,
    },

    /// A ledger entry references a file outside the allow-list
    #[error("Snapshot {id} references untrusted file {entry:?}")]
    UntrustedFileReference {
        /// Snapshot identifier
        id: String,
        /// Offending archive entry
        entry: String,
    },

    /// Loading or persisting the ledger failed
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl SnapshotError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| SnapshotError::Io { op, path, source }
    }
}

/// Restore engine errors.
///
/// Every variant up to and including [`RestoreError::Busy`] is raised
/// before any document is touched.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    /// The confirmation token does not name the requested snapshot
    #[error("Restore of {requested} not confirmed (confirmation names {confirmed:?})")]
    ConfirmationMismatch {
        /// Snapshot the caller asked to restore
        requested: String,
        /// Snapshot the confirmation token names
        confirmed: String,
    },

    /// The identifier is not a well-formed snapshot id
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidSnapshotId),

    /// No ledger entry has this identifier
    #[error("Snapshot not found: {id}")]
    NotFound {
        /// Requested identifier
        id: String,
    },

    /// The snapshot references a file outside the allow-list
    #[error("Snapshot {id} references untrusted file {entry:?}; nothing was restored")]
    UntrustedFileReference {
        /// Snapshot identifier
        id: String,
        /// Offending archive entry
        entry: String,
    },

    /// Another maintenance operation is in progress
    #[error(transparent)]
    Busy(#[from] Busy),

    /// Restoring one document failed.
    ///
    /// Documents in `restored` were written before the failure and stay
    /// applied.
    #[error("Restore of {document} from {id} failed after restoring {restored:?}: {source}")]
    Document {
        /// Snapshot identifier
        id: String,
        /// Document that failed
        document: DocumentName,
        /// Documents already restored by this call
        restored: Vec<DocumentName>,
        /// Underlying error
        #[source]
        source: Box<SnapshotError>,
    },

    /// The all-or-nothing restore batch failed.
    ///
    /// Unless the batch error is fatal, every document holds its
    /// pre-restore content.
    #[error("Atomic restore of {id} failed: {source}")]
    Batch {
        /// Snapshot identifier
        id: String,
        /// Underlying error
        #[source]
        source: StoreError,
    },
}

impl RestoreError {
    /// Whether the request itself was at fault (bad id, unknown snapshot,
    /// untrusted ledger entry, missing confirmation).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RestoreError::ConfirmationMismatch { .. }
                | RestoreError::InvalidIdentifier(_)
                | RestoreError::NotFound { .. }
                | RestoreError::UntrustedFileReference { .. }
        )
    }

    /// Documents left applied by a failed restore
    pub fn restored(&self) -> &[DocumentName] {
        match self {
            RestoreError::Document { restored, .. } => restored,
            _ => &[],
        }
    }
}

/// Result alias for snapshot operations
pub type Result<T> = std::result::Result<T, SnapshotError>;
