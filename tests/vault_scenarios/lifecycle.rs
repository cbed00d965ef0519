//! Open, configuration, scheduler and shutdown

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use docvault::{ConfigError, Error};
use serde_json::json;

use crate::common::*;

#[test]
fn shutdown_takes_final_snapshot_once() {
    let tv = TestVault::with_config(|c| c.with_snapshot_on_shutdown(true));
    tv.vault
        .write(DocumentName::Workflows, &json!({"workflows": [{"id": "last"}]}))
        .unwrap();

    let id = tv.vault.shutdown().unwrap().expect("final snapshot");
    assert_eq!(tv.vault.list_snapshots()[0].id, id);

    assert_eq!(tv.vault.shutdown().unwrap(), None);
    assert_eq!(tv.vault.list_snapshots().len(), 1);

    // Documents stay usable after shutdown
    tv.vault.write(DocumentName::Sessions, &json!({"sessions": []})).unwrap();
}

#[test]
fn shutdown_without_final_snapshot() {
    let tv = TestVault::new();
    assert_eq!(tv.vault.shutdown().unwrap(), None);
    assert!(tv.vault.list_snapshots().is_empty());
}

#[test]
fn drop_runs_shutdown() {
    let tv = TestVault::with_config(|c| c.with_snapshot_on_shutdown(true));
    let tv = tv.reopen();
    assert_eq!(tv.vault.list_snapshots().len(), 1);
}

#[test]
fn scheduler_takes_periodic_snapshots() {
    let tv = TestVault::with_config(|c| {
        c.with_scheduler(true)
            .with_interval(Duration::from_millis(20))
    });

    let deadline = Instant::now() + Duration::from_secs(10);
    while tv.vault.list_snapshots().len() < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(tv.vault.list_snapshots().len() >= 2);

    assert_eq!(tv.vault.shutdown().unwrap(), None);
    let settled = tv.vault.list_snapshots().len();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(tv.vault.list_snapshots().len(), settled);
}

#[test]
fn scheduler_shutdown_takes_final_snapshot() {
    let tv = TestVault::with_config(|c| {
        c.with_scheduler(true)
            .with_interval(Duration::from_secs(3600))
            .with_snapshot_on_shutdown(true)
    });
    assert!(tv.vault.list_snapshots().is_empty());

    let id = tv.vault.shutdown().unwrap().expect("final snapshot");
    assert_eq!(tv.vault.get_snapshot(id.as_str()).unwrap().id, id);
}

#[test]
fn config_from_lookup_opens_vault() {
    let dir = tempfile::TempDir::new().unwrap();
    let env: HashMap<&str, String> = HashMap::from([
        ("DOCVAULT_DATA_DIR", dir.path().display().to_string()),
        ("DOCVAULT_VERIFY_WRITES", "true".to_string()),
        ("BACKUP_ENABLED", "false".to_string()),
        ("BACKUP_COMPRESS", "false".to_string()),
        ("BACKUP_MAX_COUNT", "5".to_string()),
        ("BACKUP_RESTORE_MODE", "atomic".to_string()),
    ]);
    let config = VaultConfig::from_lookup(|key| env.get(key).cloned()).unwrap();

    assert!(config.verify_writes);
    assert!(!config.backup.enabled);
    assert_eq!(config.backup.max_snapshots, Some(5));
    assert_eq!(config.backup.restore_mode, RestoreMode::Atomic);

    let vault = DocVault::open(config).unwrap();
    let snapshot = vault.create_snapshot().unwrap();
    assert!(!snapshot.compressed);
}

#[test]
fn invalid_config_is_rejected_before_touching_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let data_dir = dir.path().join("vault");
    let config = VaultConfig::for_testing(&data_dir).with_max_snapshots(0);

    let err = DocVault::open(config).err().expect("open should fail");

    assert!(matches!(err, Error::Config(ConfigError::ZeroMaxSnapshots)));
    assert!(err.is_client_error());
    assert!(!data_dir.exists());
}

#[test]
fn counters_track_operations() {
    let tv = TestVault::new();
    let before = tv.vault.counters();
    tv.vault
        .write(DocumentName::Workflows, &json!({"workflows": []}))
        .unwrap();
    let after_write = tv.vault.counters();
    assert_eq!(after_write.writes, before.writes + 1);

    tv.snapshot();

    // Archive traffic is not document traffic
    let after = tv.vault.counters();
    assert_eq!(after.writes, after_write.writes);
    assert_eq!(after.bytes_written, after_write.bytes_written);
    assert_eq!(after.snapshots_created, before.snapshots_created + 1);
    assert_eq!(after.write_failures, 0);
}
