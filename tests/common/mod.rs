//! Shared test utilities for the vault integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
pub use docvault::{
    DocVault, DocumentName, ManualClock, RestoreConfirmation, RestoreMode, VaultConfig,
};
use tempfile::TempDir;

// ============================================================================
// Initialization
// ============================================================================

/// Route tracing output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// ============================================================================
// TestVault - vault on a temporary data directory
// ============================================================================

/// A vault rooted in a temp dir and driven by a manual clock
pub struct TestVault {
    pub vault: DocVault,
    pub clock: Arc<ManualClock>,
    pub dir: TempDir,
}

impl TestVault {
    /// Scheduler disabled, writes verified
    pub fn new() -> Self {
        Self::with_config(|c| c)
    }

    /// Start from the testing config and adjust it
    pub fn with_config(adjust: impl FnOnce(VaultConfig) -> VaultConfig) -> Self {
        init_tracing();
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = adjust(VaultConfig::for_testing(dir.path()));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap(),
        ));
        let vault = DocVault::open_with_clock(config, clock.clone()).expect("Failed to open vault");
        TestVault { vault, clock, dir }
    }

    /// Shut the current vault down and open a new one on the same directory
    pub fn reopen(self) -> Self {
        let TestVault { vault, clock, dir } = self;
        let config = vault.config().clone();
        drop(vault);
        let vault = DocVault::open_with_clock(config, clock.clone()).expect("Failed to reopen vault");
        TestVault { vault, clock, dir }
    }

    /// Take a snapshot and return its id
    pub fn snapshot(&self) -> String {
        let snapshot = self.vault.create_snapshot().expect("snapshot failed");
        snapshot.id.as_str().to_string()
    }

    /// Restore with a matching confirmation
    pub fn restore(&self, id: &str) -> docvault::Result<docvault::RestoreReport> {
        self.vault.restore(id, &RestoreConfirmation::for_snapshot(id))
    }
}
