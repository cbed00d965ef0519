//! Point-in-time backups for docvault
//!
//! This crate snapshots the document store into timestamped directories,
//! tracks them in a ledger, enforces tiered retention and restores them:
//! - `id`: snapshot identifiers (`backup-YYYY-MM-DDTHH-mm-ss-sssZ`)
//! - `codec`: archive encodings (identity, gzip)
//! - `ledger`: authoritative snapshot records and per-snapshot metadata
//! - `retention`: daily/weekly/monthly tier planning
//! - `lock`: snapshot/restore mutual exclusion
//! - `manager`: snapshot creation, listing, pruning, deletion, verification
//! - `restore`: validated restore back into the document store
//! - `scheduler`: periodic snapshots on a background thread

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod id;
pub mod ledger;
pub mod lock;
pub mod manager;
pub mod restore;
pub mod retention;
pub mod scheduler;

pub use codec::{codec_for, ArchiveCodec, CodecError, GzipCodec, IdentityCodec};
pub use error::{RestoreError, SnapshotError};
pub use id::{InvalidSnapshotId, SnapshotId, SNAPSHOT_ID_PREFIX};
pub use ledger::{LedgerError, Snapshot, SnapshotFile, SnapshotLedger, SnapshotMetadata};
pub use lock::{Busy, MaintenanceGuard, MaintenanceLock};
pub use manager::{SnapshotManager, SnapshotStats};
pub use restore::{RestoreConfirmation, RestoreEngine, RestoreReport};
pub use retention::{plan_retention, RetentionPlan, RetentionTier};
pub use scheduler::{SnapshotScheduler, SCHEDULER_THREAD_NAME};
