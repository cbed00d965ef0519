//! Snapshot creation, listing, verification and retention

use std::fs;

use chrono::Duration;
use docvault::{RetentionConfig, SnapshotError};
use serde_json::json;

use crate::common::*;

#[test]
fn snapshot_lists_newest_first() {
    let tv = TestVault::new();
    let first = tv.snapshot();
    tv.clock.advance(Duration::hours(1));
    let second = tv.snapshot();

    let ids: Vec<String> = tv
        .vault
        .list_snapshots()
        .into_iter()
        .map(|s| s.id.to_string())
        .collect();
    assert_eq!(ids, vec![second.clone(), first]);

    let stats = tv.vault.snapshot_stats();
    assert_eq!(stats.count, 2);
    assert!(stats.oldest < stats.newest);
    assert_eq!(tv.vault.get_snapshot(&second).unwrap().id.as_str(), second);
}

#[test]
fn snapshots_taken_in_the_same_millisecond_get_distinct_ids() {
    let tv = TestVault::new();
    let a = tv.snapshot();
    let b = tv.snapshot();
    assert_ne!(a, b);
    assert_eq!(tv.vault.list_snapshots().len(), 2);
}

#[test]
fn snapshot_records_every_document() {
    let tv = TestVault::with_config(|c| c.with_compression(false));
    tv.vault
        .write(DocumentName::Workflows, &json!({"workflows": [{"id": "w1"}]}))
        .unwrap();
    let snapshot = tv.vault.create_snapshot().unwrap();

    assert!(!snapshot.compressed);
    assert_eq!(snapshot.files.len(), DocumentName::ALL.len());
    assert_eq!(snapshot.total_size, snapshot.total_compressed_size);

    let dir = tv.vault.snapshots().snapshot_dir(&snapshot.id);
    assert!(dir.join("metadata.json").exists());
    for file in &snapshot.files {
        assert!(dir.join(&file.archive).exists(), "{}", file.archive);
    }

    let verified = tv.vault.verify_snapshot(snapshot.id.as_str()).unwrap();
    assert_eq!(verified, DocumentName::ALL.to_vec());
}

#[test]
fn verify_reports_tampered_archive() {
    let tv = TestVault::new();
    let snapshot = tv.vault.create_snapshot().unwrap();
    let archive = tv
        .vault
        .snapshots()
        .snapshot_dir(&snapshot.id)
        .join(&snapshot.files[0].archive);
    fs::write(&archive, b"not an archive").unwrap();

    let err = tv.vault.verify_snapshot(snapshot.id.as_str()).unwrap_err();
    assert!(!err.is_client_error());
}

#[test]
fn delete_removes_ledger_entry_and_directory() {
    let tv = TestVault::new();
    let id = tv.snapshot();
    let dir = tv.vault.config().backups_dir().join(&id);
    assert!(dir.exists());

    tv.vault.delete_snapshot(&id).unwrap();

    assert!(!dir.exists());
    assert!(tv.vault.list_snapshots().is_empty());
    let err = tv.vault.delete_snapshot(&id).unwrap_err();
    assert!(matches!(err, docvault::Error::Snapshot(SnapshotError::NotFound { .. })));
    assert!(err.is_client_error());
}

#[test]
fn overall_cap_bounds_snapshot_count() {
    let tv = TestVault::with_config(|c| c.with_max_snapshots(2));
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(tv.snapshot());
        tv.clock.advance(Duration::minutes(10));
    }

    let kept: Vec<String> = tv
        .vault
        .list_snapshots()
        .into_iter()
        .map(|s| s.id.to_string())
        .collect();
    assert_eq!(kept, vec![ids[4].clone(), ids[3].clone()]);
    assert_eq!(tv.vault.counters().snapshots_pruned, 3);
    assert!(!tv.vault.config().backups_dir().join(&ids[0]).exists());
}

#[test]
fn aged_snapshots_move_through_tiers() {
    let tv = TestVault::with_config(|c| {
        c.with_retention(RetentionConfig {
            daily: 2,
            weekly: 1,
            monthly: 1,
        })
    });

    // Two weeks apart: after a year they have all aged out of every tier
    for _ in 0..4 {
        tv.snapshot();
        tv.clock.advance(Duration::days(14));
    }
    assert!(tv.vault.list_snapshots().len() <= 4);

    tv.clock.advance(Duration::days(400));
    let plan = tv.vault.apply_retention().unwrap();
    assert!(!plan.prune.is_empty());
    assert!(tv.vault.list_snapshots().is_empty());
}

#[test]
fn ledger_survives_reopen() {
    let tv = TestVault::new();
    let id = tv.snapshot();

    let tv = tv.reopen();

    let snapshots = tv.vault.list_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].id.as_str(), id);
    tv.vault.verify_snapshot(&id).unwrap();
}
