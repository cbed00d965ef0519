//! Durability layer for DocVault
//!
//! This crate handles every document mutation that touches disk:
//!
//! - AtomicWriter: write-fsync-rename with sidecar backup and optional MD5 verification
//! - BatchCoordinator: all-or-nothing commit of several atomic writes
//! - DocumentStore: named documents, per-document locking, change events
//! - Write-stage hooks: fault-injection seam for crash testing
//! - Orphan sweep: removal of temp files and sidecars left by a crash

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod atomic;
pub mod batch;
pub mod checksum;
pub mod error;
pub mod fsutil;
pub mod hook;
pub mod store;

pub use atomic::{AtomicWriter, WriteOptions, WriteResult};
pub use batch::{BatchCoordinator, BatchResult};
pub use checksum::{md5_file, md5_hex};
pub use error::{BatchError, RollbackFailure, WriteError};
pub use fsutil::{sweep_orphans, SweepReport};
pub use hook::{NoopHook, WriteHook, WriteStage};
pub use store::{DocumentBatch, DocumentStore, StoreError};
