//! Snapshot ledger
//!
//! The ledger is the authoritative record of which snapshots exist and are
//! restorable. A snapshot directory without a ledger entry is invisible to
//! listing and restore.
//!
//! ```text
//! backups/
//! ├── ledger.json
//! ├── backup-2024-01-01T00-00-00-000Z/
//! │   ├── metadata.json
//! │   ├── workflows.json.gz
//! │   ├── store-state.json.gz
//! │   └── sessions.json.gz
//! └── backup-2024-01-02T00-00-00-000Z/
//!     └── ...
//! ```
//!
//! The ledger file is only ever replaced through the atomic writer, so a
//! crash leaves either the previous or the next ledger on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use docvault_core::DocumentName;
use docvault_durability::{AtomicWriter, WriteError, WriteOptions};
use serde::{Deserialize, Serialize};

use crate::codec::codec_for;
use crate::id::SnapshotId;

/// Ledger and metadata format version.
pub const LEDGER_VERSION: u32 = 1;

/// Ledger file name under the backups root.
pub const LEDGER_FILE: &str = "ledger.json";

/// Per-snapshot metadata file name
pub const METADATA_FILE: &str = "metadata.json";

/// Ledger errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Reading the ledger failed
    #[error("Failed to read ledger {}: {source}", .path.display())]
    Read {
        /// Ledger file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The ledger is not valid JSON of the expected shape.
    #[error("Failed to parse ledger {}: {source}", .path.display())]
    Parse {
        /// Ledger file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// The ledger was written by a newer version.
    #[error("Unsupported ledger version {found} (expected {expected})", expected = LEDGER_VERSION)]
    UnsupportedVersion {
        /// Version found on disk
        found: u32,
    },

    /// Persisting the ledger failed
    #[error("Failed to write ledger: {0}")]
    Write(#[from] WriteError),
}

/// One archived document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFile {
    /// Logical document name
    pub document: String,
    /// Document file the archive was taken from.
    pub original_path: PathBuf,
    /// Archive file name inside the snapshot directory.
    pub archive: String,
    /// Uncompressed size
    pub size_bytes: u64,
    /// Size of the archive on disk.
    pub compressed_size_bytes: u64,
    /// MD5 of the uncompressed content.
    pub md5: String,
}

impl SnapshotFile {
    /// The allow-listed document this entry restores to.
    ///
    /// Returns `None` unless the document name is on the allow-list and
    /// the archive name is exactly the one this layer would have written
    /// for it. The recorded `original_path` is informational and never
    /// used as a restore target.
    pub fn trusted_document(&self, extension: &str) -> Option<DocumentName> {
        let name = DocumentName::parse(&self.document)?;
        let expected = format!("{}{}", name.file_name(), extension);
        (self.archive == expected).then_some(name)
    }
}

/// A ledgered snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Identifier (also the directory name).
    pub id: SnapshotId,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Archived documents
    pub files: Vec<SnapshotFile>,
    /// Sum of uncompressed sizes
    pub total_size: u64,
    /// Sum of archive sizes
    pub total_compressed_size: u64,
    /// Whether archives are gzip-compressed
    pub compressed: bool,
    /// Time taken to create the snapshot.
    pub duration_ms: u64,
}

impl Snapshot {
    /// Archive name suffix used by this snapshot's codec.
    pub fn archive_extension(&self) -> &'static str {
        codec_for(self.compressed).extension()
    }

    /// Map every entry to its allow-listed document.
    ///
    /// Fails with the first entry that is not trusted or that names a
    /// document already covered by an earlier entry.
    pub fn trusted_documents(&self) -> Result<Vec<DocumentName>, &SnapshotFile> {
        let extension = self.archive_extension();
        let mut documents = Vec::with_capacity(self.files.len());
        for file in &self.files {
            match file.trusted_document(extension) {
                Some(name) if !documents.contains(&name) => documents.push(name),
                _ => return Err(file),
            }
        }
        Ok(documents)
    }
}

/// Contents of a snapshot directory's `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Creation instant
    pub timestamp: DateTime<Utc>,
    /// Archived documents
    pub files: Vec<SnapshotFile>,
    /// Format version
    pub version: u32,
}

impl From<&Snapshot> for SnapshotMetadata {
    fn from(snapshot: &Snapshot) -> Self {
        SnapshotMetadata {
            timestamp: snapshot.created_at,
            files: snapshot.files.clone(),
            version: LEDGER_VERSION,
        }
    }
}

/// Ordered collection of ledgered snapshots.
///
/// Kept sorted oldest-first by identifier, which is creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLedger {
    version: u32,
    snapshots: Vec<Snapshot>,
}

impl Default for SnapshotLedger {
    fn default() -> Self {
        SnapshotLedger {
            version: LEDGER_VERSION,
            snapshots: Vec::new(),
        }
    }
}

impl SnapshotLedger {
    /// Load the ledger at `path`; a missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(LedgerError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut ledger: SnapshotLedger =
            serde_json::from_slice(&bytes).map_err(|source| LedgerError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if ledger.version > LEDGER_VERSION {
            return Err(LedgerError::UnsupportedVersion {
                found: ledger.version,
            });
        }
        ledger.snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(ledger)
    }

    /// Atomically replace the ledger file with this ledger.
    pub fn save(&self, writer: &AtomicWriter, path: &Path, verify: bool) -> Result<(), LedgerError> {
        writer.write_json(path, self, WriteOptions::default().with_verify(verify))?;
        Ok(())
    }

    /// Add a snapshot, keeping creation order.
    pub fn insert(&mut self, snapshot: Snapshot) {
        let at = self.snapshots.partition_point(|s| s.id < snapshot.id);
        self.snapshots.insert(at, snapshot);
    }

    /// Remove a snapshot by identifier.
    pub fn remove(&mut self, id: &SnapshotId) -> Option<Snapshot> {
        let at = self.snapshots.iter().position(|s| &s.id == id)?;
        Some(self.snapshots.remove(at))
    }

    /// Look up a snapshot
    pub fn get(&self, id: &SnapshotId) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| &s.id == id)
    }

    /// Whether `id` is ledgered
    pub fn contains(&self, id: &SnapshotId) -> bool {
        self.get(id).is_some()
    }

    /// Snapshots oldest-first
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Number of ledgered snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
