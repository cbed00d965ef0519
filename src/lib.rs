//! DocVault - crash-safe JSON document persistence
//!
//! DocVault keeps a fixed set of JSON documents (workflows, store state,
//! sessions) on disk so that no partial or torn write can ever corrupt
//! them, and takes point-in-time snapshots with tiered retention and
//! validated restore.
//!
//! # Quick Start
//!
//! ```ignore
//! use docvault::{DocVault, DocumentName, RestoreConfirmation, VaultConfig};
//! use serde_json::json;
//!
//! let vault = DocVault::open(VaultConfig::from_env()?)?;
//!
//! vault.write(DocumentName::Workflows, &json!({"workflows": [{"id": "w1"}]}))?;
//! let snapshot = vault.create_snapshot()?;
//!
//! let id = snapshot.id.as_str();
//! vault.restore(id, &RestoreConfirmation::for_snapshot(id))?;
//!
//! vault.shutdown()?;
//! ```
//!
//! # Architecture
//!
//! - `docvault-core`: document names, config, clock, events, counters
//! - `docvault-durability`: atomic writer, batch coordinator, document store
//! - `docvault-backup`: snapshots, ledger, retention, restore, scheduler
//!
//! [`DocVault`] wires them together for one data directory.

#![warn(missing_docs)]

mod error;
mod vault;

pub use error::{Error, Result};
pub use vault::DocVault;

pub use docvault_backup::{
    RestoreConfirmation, RestoreError, RestoreReport, RetentionPlan, Snapshot, SnapshotError,
    SnapshotFile, SnapshotId, SnapshotStats,
};
pub use docvault_core::{
    BackupConfig, ConfigError, CounterSnapshot, DocumentName, ManualClock, RestoreMode,
    RetentionConfig, VaultConfig, VaultEvent,
};
pub use docvault_durability::{BatchError, DocumentBatch, StoreError, WriteError, WriteResult};
