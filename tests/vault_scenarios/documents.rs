//! Document reads, writes and batches through the facade

use std::fs;

use docvault::VaultEvent;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::common::*;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Workflows {
    workflows: Vec<Workflow>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Workflow {
    id: String,
    name: String,
}

#[test]
fn fresh_vault_has_default_documents() {
    let tv = TestVault::new();
    for name in DocumentName::ALL {
        assert_eq!(tv.vault.read(name).unwrap(), name.default_value());
        assert!(tv.vault.config().documents_dir().join(name.file_name()).exists());
    }
}

#[test]
fn typed_write_then_read() {
    let tv = TestVault::new();
    let doc = Workflows {
        workflows: vec![Workflow {
            id: "w1".into(),
            name: "Nightly import".into(),
        }],
    };

    let result = tv.vault.write(DocumentName::Workflows, &doc).unwrap();
    assert!(result.bytes_written > 0);

    let back: Workflows = tv.vault.read_as(DocumentName::Workflows).unwrap();
    assert_eq!(back, doc);
}

#[test]
fn batch_commits_every_document() {
    let tv = TestVault::new();
    let rx = tv.vault.subscribe();

    let mut batch = tv.vault.batch();
    batch
        .put(DocumentName::Workflows, &json!({"workflows": [{"id": "w2"}]}))
        .unwrap();
    batch
        .put(DocumentName::Sessions, &json!({"sessions": [{"id": "s1"}]}))
        .unwrap();
    batch.commit().unwrap();

    assert_eq!(
        tv.vault.read(DocumentName::Workflows).unwrap(),
        json!({"workflows": [{"id": "w2"}]})
    );
    assert_eq!(
        tv.vault.read(DocumentName::Sessions).unwrap(),
        json!({"sessions": [{"id": "s1"}]})
    );
    assert_eq!(tv.vault.counters().batches_committed, 1);

    let events: Vec<VaultEvent> = rx.try_iter().collect();
    assert!(events.contains(&VaultEvent::BatchCommitted {
        documents: vec![DocumentName::Workflows, DocumentName::Sessions],
    }));
}

#[test]
fn documents_survive_reopen_and_orphans_are_swept() {
    let tv = TestVault::new();
    tv.vault
        .write(DocumentName::StoreState, &json!({"theme": "dark"}))
        .unwrap();

    let docs = tv.vault.config().documents_dir();
    let stray_temp = docs.join(".store-state.json.deadbeef.tmp");
    let stray_backup = docs.join(".store-state.json.deadbeef.bak");
    fs::write(&stray_temp, b"{\"theme\":").unwrap();
    fs::write(&stray_backup, b"{}").unwrap();

    let tv = tv.reopen();

    assert!(!stray_temp.exists());
    assert!(!stray_backup.exists());
    assert_eq!(
        tv.vault.read(DocumentName::StoreState).unwrap(),
        json!({"theme": "dark"})
    );
}

#[test]
fn corrupt_document_is_a_server_error() {
    let tv = TestVault::new();
    let path = tv.vault.config().documents_dir().join("sessions.json");
    fs::write(&path, b"{\"sessions\": [").unwrap();

    let err = tv.vault.read(DocumentName::Sessions).unwrap_err();
    assert!(matches!(err, docvault::Error::Store(docvault::StoreError::Parse { .. })));
    assert!(!err.is_client_error());
}
