//! Named document store
//!
//! Maps each [`DocumentName`] to its JSON file and routes every mutation
//! through the atomic writer. Writers of the same document are serialized
//! by a per-document mutex; a batch takes the mutexes of all its documents
//! in [`DocumentName::ALL`] order, so two batches can never deadlock.
//!
//! ```text
//! documents/
//! ├── workflows.json
//! ├── store-state.json
//! └── sessions.json
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docvault_core::{DocumentName, EventBus, VaultEvent};
use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::atomic::{to_json_bytes, AtomicWriter, WriteOptions, WriteResult};
use crate::batch::{BatchCoordinator, BatchResult};
use crate::error::{BatchError, WriteError};
use crate::fsutil::sweep_orphans;

/// Document store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading a document failed
    #[error("Failed to read {document} from {}: {source}", .path.display())]
    Read {
        /// Document being read
        document: DocumentName,
        /// Backing file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// A document's content is not valid for the requested type.
    #[error("Failed to parse {document}: {source}")]
    Parse {
        /// Document being parsed
        document: DocumentName,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Preparing the documents directory failed.
    #[error("Failed to prepare documents directory {}: {source}", .path.display())]
    Open {
        /// Documents directory
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Single-document write failed
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Batch commit failed
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// JSON document store rooted at one directory.
pub struct DocumentStore {
    dir: PathBuf,
    writer: Arc<AtomicWriter>,
    verify: bool,
    locks: BTreeMap<DocumentName, Mutex<()>>,
    events: Arc<EventBus>,
}

impl DocumentStore {
    /// Open the store, creating `dir` and any missing document.
    ///
    /// Orphaned temp files and sidecar backups from an earlier crash are
    /// swept first. Absent documents are written with their default value.
    pub fn open(dir: impl Into<PathBuf>, writer: Arc<AtomicWriter>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Open {
            path: dir.clone(),
            source,
        })?;

        let swept = sweep_orphans(&dir).map_err(|source| StoreError::Open {
            path: dir.clone(),
            source,
        })?;
        if swept.total() > 0 {
            info!(
                target: "docvault::store",
                temp_files = swept.temp_files,
                backups = swept.backups,
                "Swept orphaned files from earlier crash"
            );
        }

        let store = DocumentStore {
            locks: DocumentName::ALL
                .into_iter()
                .map(|name| (name, Mutex::new(())))
                .collect(),
            dir,
            writer,
            verify: false,
            events: Arc::new(EventBus::new()),
        };

        for name in DocumentName::ALL {
            let path = store.path(name);
            if !path.exists() {
                store
                    .writer
                    .write_json(&path, &name.default_value(), WriteOptions::default())?;
                debug!(target: "docvault::store", document = %name, "Created document with default value");
            }
        }

        Ok(store)
    }

    /// Verify every write with a checksum.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Publish change events on `events`.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Documents directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Backing file of a document.
    pub fn path(&self, name: DocumentName) -> PathBuf {
        self.dir.join(name.file_name())
    }

    /// Writer shared with the store.
    pub fn writer(&self) -> &Arc<AtomicWriter> {
        &self.writer
    }

    /// Event bus the store publishes on.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn options(&self) -> WriteOptions {
        WriteOptions::default().with_verify(self.verify)
    }

    fn lock(&self, name: DocumentName) -> MutexGuard<'_, ()> {
        // Every DocumentName has an entry; the map is built from ALL.
        self.locks[&name].lock()
    }

    /// Raw bytes of a document.
    pub fn read_bytes(&self, name: DocumentName) -> Result<Vec<u8>, StoreError> {
        let path = self.path(name);
        fs::read(&path).map_err(|source| StoreError::Read {
            document: name,
            path,
            source,
        })
    }

    /// Document as a JSON value.
    pub fn read(&self, name: DocumentName) -> Result<Value, StoreError> {
        self.read_as(name)
    }

    /// Document deserialized into `T`
    pub fn read_as<T: DeserializeOwned>(&self, name: DocumentName) -> Result<T, StoreError> {
        let bytes = self.read_bytes(name)?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            document: name,
            source,
        })
    }

    /// Read several documents as one consistent cut.
    ///
    /// All their locks are held while reading, so no single write or batch
    /// can interleave. Documents missing on disk are returned as `None`.
    pub fn read_consistent(
        &self,
        names: &[DocumentName],
    ) -> Result<Vec<(DocumentName, Option<Vec<u8>>)>, StoreError> {
        let names: BTreeSet<DocumentName> = names.iter().copied().collect();
        let _guards: Vec<_> = names.iter().map(|n| self.lock(*n)).collect();

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let path = self.path(name);
            match fs::read(&path) {
                Ok(bytes) => out.push((name, Some(bytes))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => out.push((name, None)),
                Err(source) => {
                    return Err(StoreError::Read {
                        document: name,
                        path,
                        source,
                    })
                }
            }
        }
        Ok(out)
    }

    /// Replace a document with a JSON value.
    pub fn write<T: Serialize + ?Sized>(&self, name: DocumentName, value: &T) -> Result<WriteResult, StoreError> {
        let path = self.path(name);
        let bytes = to_json_bytes(&path, value)?;
        self.write_bytes(name, &bytes)
    }

    /// Replace a document with raw bytes.
    pub fn write_bytes(&self, name: DocumentName, bytes: &[u8]) -> Result<WriteResult, StoreError> {
        let result = {
            let _guard = self.lock(name);
            self.writer.write_bytes(&self.path(name), bytes, self.options())?
        };
        self.events.publish(VaultEvent::DocumentUpdated { document: name });
        Ok(result)
    }

    /// Start a multi-document batch
    pub fn batch(&self) -> DocumentBatch<'_> {
        DocumentBatch {
            store: self,
            entries: Vec::new(),
        }
    }
}

/// Pending writes against a [`DocumentStore`]
pub struct DocumentBatch<'s> {
    store: &'s DocumentStore,
    entries: Vec<(DocumentName, Vec<u8>)>,
}

impl<'s> DocumentBatch<'s> {
    /// Queue a JSON value for a document.
    pub fn put<T: Serialize + ?Sized>(&mut self, name: DocumentName, value: &T) -> Result<&mut Self, StoreError> {
        let bytes = to_json_bytes(&self.store.path(name), value)?;
        Ok(self.put_bytes(name, bytes))
    }

    /// Queue raw bytes for a document.
    pub fn put_bytes(&mut self, name: DocumentName, bytes: Vec<u8>) -> &mut Self {
        self.entries.push((name, bytes));
        self
    }

    /// Documents queued so far, in commit order.
    pub fn documents(&self) -> Vec<DocumentName> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    /// Commit every queued write, or none.
    pub fn commit(self) -> Result<BatchResult, StoreError> {
        let documents = self.documents();
        let locked: BTreeSet<DocumentName> = documents.iter().copied().collect();
        let options = self.store.options();

        let result = {
            let _guards: Vec<_> = locked.iter().map(|n| self.store.lock(*n)).collect();
            let mut coordinator = BatchCoordinator::new(&self.store.writer);
            for (name, bytes) in self.entries {
                coordinator.add_bytes(self.store.path(name), bytes, options);
            }
            coordinator.commit()?
        };

        self.store
            .events
            .publish(VaultEvent::BatchCommitted { documents });
        Ok(result)
    }
}
