//! Restore through the facade: confirmation, validation, failure modes

use std::fs;

use docvault::{Error, RestoreError, VaultEvent};
use serde_json::json;

use crate::common::*;

fn seed(tv: &TestVault) {
    tv.vault
        .write(DocumentName::Workflows, &json!({"workflows": [{"id": "w1"}]}))
        .unwrap();
    tv.vault
        .write(DocumentName::StoreState, &json!({"theme": "dark"}))
        .unwrap();
    tv.vault
        .write(DocumentName::Sessions, &json!({"sessions": [{"id": "s1"}]}))
        .unwrap();
}

fn overwrite_all(tv: &TestVault) {
    for name in DocumentName::ALL {
        tv.vault.write(name, &name.default_value()).unwrap();
    }
}

/// Replace the sessions archive of snapshot `id` with garbage
fn corrupt_sessions_archive(tv: &TestVault, id: &str) {
    let snapshot = tv.vault.get_snapshot(id).unwrap();
    let file = snapshot
        .files
        .iter()
        .find(|f| f.document == "sessions")
        .unwrap();
    let path = tv.vault.snapshots().snapshot_dir(&snapshot.id).join(&file.archive);
    fs::write(path, b"garbage").unwrap();
}

#[test]
fn restore_brings_back_snapshot_content() {
    let tv = TestVault::new();
    seed(&tv);
    let id = tv.snapshot();
    overwrite_all(&tv);
    let rx = tv.vault.subscribe();

    let report = tv.restore(&id).unwrap();

    assert_eq!(report.snapshot_id.as_str(), id);
    assert_eq!(report.documents, DocumentName::ALL.to_vec());
    assert_eq!(
        tv.vault.read(DocumentName::Workflows).unwrap(),
        json!({"workflows": [{"id": "w1"}]})
    );
    assert_eq!(
        tv.vault.read(DocumentName::StoreState).unwrap(),
        json!({"theme": "dark"})
    );
    assert_eq!(tv.vault.counters().restores, 1);
    assert!(rx.try_iter().any(|e| matches!(
        e,
        VaultEvent::SnapshotRestored { ref snapshot_id, .. } if *snapshot_id == id
    )));
}

#[test]
fn mismatched_confirmation_changes_nothing() {
    let tv = TestVault::new();
    seed(&tv);
    let first = tv.snapshot();
    overwrite_all(&tv);
    let second = tv.snapshot();

    let err = tv
        .vault
        .restore(&first, &RestoreConfirmation::for_snapshot(second))
        .unwrap_err();

    assert!(matches!(err, Error::Restore(RestoreError::ConfirmationMismatch { .. })));
    assert!(err.is_client_error());
    assert_eq!(tv.vault.read(DocumentName::Workflows).unwrap(), json!({"workflows": []}));
    assert_eq!(tv.vault.counters().restore_failures, 0);
}

#[test]
fn invalid_and_unknown_ids_are_client_errors() {
    let tv = TestVault::new();
    tv.snapshot();

    let err = tv.restore("../../etc/passwd").unwrap_err();
    assert!(matches!(err, Error::Restore(RestoreError::InvalidIdentifier(_))));
    assert!(err.is_client_error());

    let err = tv.restore("backup-2001-01-01T00-00-00-000Z").unwrap_err();
    assert!(matches!(err, Error::Restore(RestoreError::NotFound { .. })));
    assert!(err.is_client_error());

    assert_eq!(tv.vault.counters().restore_failures, 0);
}

#[test]
fn independent_restore_reports_partial_progress() {
    let tv = TestVault::new();
    seed(&tv);
    let id = tv.snapshot();
    overwrite_all(&tv);
    corrupt_sessions_archive(&tv, &id);

    let err = tv.restore(&id).unwrap_err();

    assert!(!err.is_client_error());
    let Error::Restore(restore_err) = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(
        restore_err.restored(),
        &[DocumentName::Workflows, DocumentName::StoreState]
    );
    assert_eq!(
        tv.vault.read(DocumentName::Workflows).unwrap(),
        json!({"workflows": [{"id": "w1"}]})
    );
    assert_eq!(tv.vault.read(DocumentName::Sessions).unwrap(), json!({"sessions": []}));
    assert_eq!(tv.vault.counters().restore_failures, 1);
}

#[test]
fn atomic_restore_leaves_documents_untouched_on_failure() {
    let tv = TestVault::with_config(|c| c.with_restore_mode(RestoreMode::Atomic));
    seed(&tv);
    let id = tv.snapshot();
    overwrite_all(&tv);
    corrupt_sessions_archive(&tv, &id);

    let err = tv.restore(&id).unwrap_err();

    let Error::Restore(restore_err) = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert!(restore_err.restored().is_empty());
    for name in DocumentName::ALL {
        assert_eq!(tv.vault.read(name).unwrap(), name.default_value());
    }
}

#[test]
fn atomic_restore_applies_every_document() {
    let tv = TestVault::with_config(|c| c.with_restore_mode(RestoreMode::Atomic));
    seed(&tv);
    let id = tv.snapshot();
    overwrite_all(&tv);

    let report = tv.restore(&id).unwrap();

    assert_eq!(report.documents.len(), DocumentName::ALL.len());
    assert_eq!(
        tv.vault.read(DocumentName::Sessions).unwrap(),
        json!({"sessions": [{"id": "s1"}]})
    );
    assert_eq!(tv.vault.counters().batches_committed, 1);
}
