//! Snapshot manager
//!
//! Produces timestamped, optionally gzip-compressed copies of the tracked
//! documents, records them in the ledger and enforces tiered retention.
//!
//! # Commit protocol
//!
//! 1. Allocate an identifier from the clock, later than every ledgered
//!    one, and create its directory
//! 2. Read the documents as one consistent cut
//! 3. Write one archive per document, then `metadata.json`
//! 4. Append the snapshot to the ledger (atomic ledger rewrite)
//! 5. Apply retention
//!
//! Step 4 is the commit point. A failure before it leaves an un-ledgered
//! directory that listing and restore never see and that
//! [`SnapshotManager::collect_garbage`] removes later.
//!
//! Pruning runs the other way round: ledger entries are removed first, then
//! directories. A crash in between leaves garbage, never a ledger entry
//! pointing at a missing directory.
//!
//! Archives, `metadata.json` and the ledger go through a dedicated archive
//! writer whose counters are separate from the document store's, so
//! document write metrics only ever count document traffic.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use docvault_core::{BackupConfig, Clock, DocumentName, SystemClock, VaultEvent};
use docvault_durability::{md5_hex, sweep_orphans, AtomicWriter, DocumentStore, WriteOptions};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::codec::codec_for;
use crate::error::{Result, SnapshotError};
use crate::id::SnapshotId;
use crate::ledger::{Snapshot, SnapshotFile, SnapshotLedger, SnapshotMetadata, LEDGER_FILE, METADATA_FILE};
use crate::lock::MaintenanceLock;
use crate::retention::{plan_retention, RetentionPlan};

/// Aggregate view of the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    /// Number of ledgered snapshots
    pub count: usize,
    /// Sum of uncompressed sizes
    pub total_size: u64,
    /// Sum of archive sizes
    pub total_compressed_size: u64,
    /// Creation time of the oldest snapshot.
    pub oldest: Option<DateTime<Utc>>,
    /// Creation time of the newest snapshot.
    pub newest: Option<DateTime<Utc>>,
}

/// Creates, lists, prunes and verifies snapshots.
pub struct SnapshotManager {
    root: PathBuf,
    store: Arc<DocumentStore>,
    archive_writer: Arc<AtomicWriter>,
    config: BackupConfig,
    verify: bool,
    clock: Arc<dyn Clock>,
    lock: Arc<MaintenanceLock>,
    ledger: RwLock<SnapshotLedger>,
}

impl SnapshotManager {
    /// Open the backups directory at `root`.
    ///
    /// Creates the directory, sweeps orphaned ledger temp files and loads
    /// the ledger. Un-ledgered snapshot directories are left alone until
    /// [`collect_garbage`](Self::collect_garbage) runs.
    pub fn open(root: impl Into<PathBuf>, store: Arc<DocumentStore>, config: BackupConfig) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(SnapshotError::io("create backups dir", &root))?;

        let swept = sweep_orphans(&root).map_err(SnapshotError::io("sweep backups dir", &root))?;
        if swept.total() > 0 {
            info!(
                target: "docvault::snapshot",
                temp_files = swept.temp_files,
                backups = swept.backups,
                "Swept orphaned ledger files"
            );
        }

        let ledger = SnapshotLedger::load(&root.join(LEDGER_FILE))?;
        info!(
            target: "docvault::snapshot",
            root = %root.display(),
            snapshots = ledger.len(),
            "Loaded snapshot ledger"
        );

        Ok(SnapshotManager {
            root,
            store,
            archive_writer: Arc::new(AtomicWriter::new()),
            config,
            verify: false,
            clock: Arc::new(SystemClock),
            lock: Arc::new(MaintenanceLock::new()),
            ledger: RwLock::new(ledger),
        })
    }

    /// Use `clock` for identifiers and retention ages.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Write archives, metadata and the ledger through `writer`.
    pub fn with_archive_writer(mut self, writer: Arc<AtomicWriter>) -> Self {
        self.archive_writer = writer;
        self
    }

    /// Share a maintenance lock with a restore engine.
    pub fn with_lock(mut self, lock: Arc<MaintenanceLock>) -> Self {
        self.lock = lock;
        self
    }

    /// Verify archive, metadata and ledger writes with checksums.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Backups directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a snapshot's archives.
    pub fn snapshot_dir(&self, id: &SnapshotId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Document store being snapshotted
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Writer used for snapshot files and the ledger.
    pub fn archive_writer(&self) -> &Arc<AtomicWriter> {
        &self.archive_writer
    }

    /// Maintenance lock guarding snapshot and restore operations.
    pub fn lock(&self) -> &Arc<MaintenanceLock> {
        &self.lock
    }

    /// Backup configuration
    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    fn ledger_path(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    /// Snapshot every tracked document
    pub fn create_snapshot(&self) -> Result<Snapshot> {
        self.create_snapshot_of(&DocumentName::ALL)
    }

    /// Snapshot the given documents, then apply retention.
    ///
    /// Documents missing on disk are skipped. Fails with
    /// [`SnapshotError::Busy`] if a restore or another snapshot is running.
    pub fn create_snapshot_of(&self, documents: &[DocumentName]) -> Result<Snapshot> {
        let _guard = self.lock.try_acquire("snapshot")?;
        let counters = self.store.writer().counters();

        let snapshot = match self.write_snapshot(documents) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                counters.record_snapshot(false);
                warn!(target: "docvault::snapshot", error = %e, "Snapshot failed; nothing was ledgered");
                return Err(e);
            }
        };

        counters.record_snapshot(true);
        info!(
            target: "docvault::snapshot",
            snapshot = %snapshot.id,
            files = snapshot.files.len(),
            total_size = snapshot.total_size,
            compressed_size = snapshot.total_compressed_size,
            duration_ms = snapshot.duration_ms,
            "Snapshot created"
        );
        self.store.events().publish(VaultEvent::SnapshotCreated {
            snapshot_id: snapshot.id.to_string(),
        });

        // The snapshot is ledgered; a retention failure does not undo it.
        if let Err(e) = self.prune_locked() {
            warn!(target: "docvault::retention", error = %e, "Retention pass failed after snapshot");
        }

        Ok(snapshot)
    }

    /// Identifier for a snapshot taken at `at`.
    ///
    /// Never earlier than the newest ledgered snapshot, so identifier order
    /// matches creation order even if the clock steps backwards.
    fn allocate_id(&self, at: DateTime<Utc>) -> SnapshotId {
        let ledger = self.ledger.read();
        let mut id = SnapshotId::from_timestamp(at);
        if let Some(newest) = ledger.snapshots().last() {
            if newest.id >= id {
                id = newest.id.next();
            }
        }
        while ledger.contains(&id) || self.snapshot_dir(&id).exists() {
            id = id.next();
        }
        id
    }

    fn write_snapshot(&self, documents: &[DocumentName]) -> Result<Snapshot> {
        let start = Instant::now();
        let id = self.allocate_id(self.clock.now());
        let created_at = id.timestamp();
        let dir = self.snapshot_dir(&id);
        fs::create_dir_all(&dir).map_err(SnapshotError::io("create snapshot dir", &dir))?;

        let codec = codec_for(self.config.compress);
        let writer = &self.archive_writer;
        let options = WriteOptions::default()
            .with_backup(false)
            .with_verify(self.verify);

        let mut files = Vec::with_capacity(documents.len());
        for (document, content) in self.store.read_consistent(documents)? {
            let Some(content) = content else {
                debug!(target: "docvault::snapshot", snapshot = %id, document = %document, "Document missing, skipped");
                continue;
            };

            let archive = format!("{}{}", document.file_name(), codec.extension());
            let encoded = codec.encode(&content).map_err(|source| SnapshotError::Codec {
                id: id.to_string(),
                archive: archive.clone(),
                source,
            })?;
            writer.write_bytes(&dir.join(&archive), &encoded, options)?;

            debug!(
                target: "docvault::snapshot",
                snapshot = %id,
                document = %document,
                size = content.len(),
                compressed_size = encoded.len(),
                "Archived document"
            );
            files.push(SnapshotFile {
                document: document.as_str().to_string(),
                original_path: self.store.path(document),
                archive,
                size_bytes: content.len() as u64,
                compressed_size_bytes: encoded.len() as u64,
                md5: md5_hex(&content),
            });
        }

        let snapshot = Snapshot {
            total_size: files.iter().map(|f| f.size_bytes).sum(),
            total_compressed_size: files.iter().map(|f| f.compressed_size_bytes).sum(),
            id,
            created_at,
            files,
            compressed: self.config.compress,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        writer.write_json(&dir.join(METADATA_FILE), &SnapshotMetadata::from(&snapshot), options)?;

        self.commit_ledger(|ledger| ledger.insert(snapshot.clone()))?;
        Ok(snapshot)
    }

    /// Persist a modified copy of the ledger, then publish it in memory.
    fn commit_ledger(&self, mutate: impl FnOnce(&mut SnapshotLedger)) -> Result<()> {
        let mut ledger = self.ledger.write();
        let mut next = ledger.clone();
        mutate(&mut next);
        next.save(&self.archive_writer, &self.ledger_path(), self.verify)?;
        *ledger = next;
        Ok(())
    }

    /// Enforce tiered retention and the overall cap.
    pub fn apply_retention(&self) -> Result<RetentionPlan> {
        let _guard = self.lock.try_acquire("retention")?;
        self.prune_locked()
    }

    fn prune_locked(&self) -> Result<RetentionPlan> {
        let entries: Vec<(SnapshotId, DateTime<Utc>)> = self
            .ledger
            .read()
            .snapshots()
            .iter()
            .map(|s| (s.id.clone(), s.created_at))
            .collect();
        let plan = plan_retention(
            &entries,
            self.clock.now(),
            &self.config.retention,
            self.config.max_snapshots,
        );
        if plan.is_noop() {
            debug!(target: "docvault::retention", kept = plan.keep.len(), "Nothing to prune");
            return Ok(plan);
        }

        self.commit_ledger(|ledger| {
            for id in &plan.prune {
                ledger.remove(id);
            }
        })?;
        for id in &plan.prune {
            self.remove_snapshot_dir(id);
        }

        self.store
            .writer()
            .counters()
            .record_pruned(plan.prune.len() as u64);
        info!(
            target: "docvault::retention",
            pruned = plan.prune.len(),
            kept = plan.keep.len(),
            "Applied snapshot retention"
        );
        self.store.events().publish(VaultEvent::SnapshotsPruned {
            snapshot_ids: plan.prune.iter().map(|id| id.to_string()).collect(),
        });
        Ok(plan)
    }

    /// Remove a snapshot directory whose ledger entry is already gone.
    fn remove_snapshot_dir(&self, id: &SnapshotId) {
        let dir = self.snapshot_dir(id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => debug!(target: "docvault::retention", snapshot = %id, "Removed snapshot directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                target: "docvault::retention",
                snapshot = %id,
                error = %e,
                "Failed to remove snapshot directory; left for garbage collection"
            ),
        }
    }

    /// Administratively delete one snapshot
    pub fn delete_snapshot(&self, id: &str) -> Result<Snapshot> {
        let id = SnapshotId::parse(id)?;
        let _guard = self.lock.try_acquire("delete")?;

        let removed = self
            .ledger
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| SnapshotError::NotFound { id: id.to_string() })?;
        self.commit_ledger(|ledger| {
            ledger.remove(&id);
        })?;
        self.remove_snapshot_dir(&id);

        self.store.writer().counters().record_pruned(1);
        info!(target: "docvault::snapshot", snapshot = %id, "Snapshot deleted");
        self.store.events().publish(VaultEvent::SnapshotsPruned {
            snapshot_ids: vec![id.to_string()],
        });
        Ok(removed)
    }

    /// Remove snapshot directories that have no ledger entry.
    ///
    /// Returns the identifiers of the removed directories. Entries in the
    /// backups root that are not named like snapshots are left alone.
    pub fn collect_garbage(&self) -> Result<Vec<SnapshotId>> {
        let _guard = self.lock.try_acquire("garbage collection")?;

        let entries = fs::read_dir(&self.root).map_err(SnapshotError::io("list backups dir", &self.root))?;
        let mut removed = Vec::new();
        for entry in entries {
            let entry = entry.map_err(SnapshotError::io("list backups dir", &self.root))?;
            let Ok(id) = SnapshotId::parse(&entry.file_name().to_string_lossy()) else {
                continue;
            };
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) || self.ledger.read().contains(&id) {
                continue;
            }

            let path = entry.path();
            fs::remove_dir_all(&path).map_err(SnapshotError::io("remove orphaned snapshot dir", &path))?;
            debug!(target: "docvault::snapshot", snapshot = %id, "Removed un-ledgered snapshot directory");
            removed.push(id);
        }

        if !removed.is_empty() {
            info!(target: "docvault::snapshot", removed = removed.len(), "Collected un-ledgered snapshot directories");
        }
        Ok(removed)
    }

    /// Ledgered snapshots, newest first
    pub fn list_snapshots(&self) -> Vec<Snapshot> {
        self.ledger.read().snapshots().iter().rev().cloned().collect()
    }

    /// One ledgered snapshot
    pub fn get_snapshot(&self, id: &str) -> Result<Snapshot> {
        let id = SnapshotId::parse(id)?;
        self.ledger
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| SnapshotError::NotFound { id: id.to_string() })
    }

    /// Aggregate count, sizes and age range.
    pub fn get_stats(&self) -> SnapshotStats {
        let ledger = self.ledger.read();
        let snapshots = ledger.snapshots();
        SnapshotStats {
            count: snapshots.len(),
            total_size: snapshots.iter().map(|s| s.total_size).sum(),
            total_compressed_size: snapshots.iter().map(|s| s.total_compressed_size).sum(),
            oldest: snapshots.iter().map(|s| s.created_at).min(),
            newest: snapshots.iter().map(|s| s.created_at).max(),
        }
    }

    /// Decode every archive of a snapshot and check its checksum.
    ///
    /// Returns the documents the snapshot covers.
    pub fn verify_snapshot(&self, id: &str) -> Result<Vec<DocumentName>> {
        let snapshot = self.get_snapshot(id)?;
        let mut documents = Vec::with_capacity(snapshot.files.len());
        for file in &snapshot.files {
            let (document, _) = self.read_archive(&snapshot, file)?;
            documents.push(document);
        }
        info!(target: "docvault::snapshot", snapshot = %snapshot.id, files = documents.len(), "Snapshot verified");
        Ok(documents)
    }

    /// Decoded, checksum-verified content of one archive.
    pub(crate) fn read_archive(&self, snapshot: &Snapshot, file: &SnapshotFile) -> Result<(DocumentName, Vec<u8>)> {
        let codec = codec_for(snapshot.compressed);
        let document = file
            .trusted_document(codec.extension())
            .ok_or_else(|| SnapshotError::UntrustedFileReference {
                id: snapshot.id.to_string(),
                entry: file.archive.clone(),
            })?;

        let path = self.snapshot_dir(&snapshot.id).join(&file.archive);
        let raw = fs::read(&path).map_err(SnapshotError::io("read archive", &path))?;
        let content = codec.decode(&raw).map_err(|source| SnapshotError::Codec {
            id: snapshot.id.to_string(),
            archive: file.archive.clone(),
            source,
        })?;

        let actual = md5_hex(&content);
        if actual != file.md5 {
            return Err(SnapshotError::Integrity {
                id: snapshot.id.to_string(),
                archive: file.archive.clone(),
                expected: file.md5.clone(),
                actual,
            });
        }
        Ok((document, content))
    }
}
