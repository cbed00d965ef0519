//! Core types for DocVault
//!
//! This crate defines the types shared by every layer:
//! - DocumentName: the closed set of tracked documents (and restore allow-list)
//! - Clock: wall-clock seam used for snapshot ids and retention ages
//! - VaultConfig: configuration, builder and environment loading
//! - EventBus / VaultEvent: change notifications for subscribers
//! - VaultCounters: counters exposed to the metrics layer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod counters;
pub mod document;
pub mod event;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    env_keys, BackupConfig, ConfigError, RestoreMode, RetentionConfig, VaultConfig,
};
pub use counters::{CounterSnapshot, VaultCounters};
pub use document::{DocumentName, UnknownDocument};
pub use event::{EventBus, VaultEvent};
