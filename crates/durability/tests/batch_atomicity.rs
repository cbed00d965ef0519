//! Batch all-or-nothing tests at the document store level

use docvault_core::DocumentName;
use docvault_durability::{AtomicWriter, DocumentStore, StoreError, WriteStage};
use serde_json::json;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Writer whose Nth temp file write (1-based) fails
fn fail_nth_write(n: usize) -> Arc<AtomicWriter> {
    let seen = AtomicUsize::new(0);
    let hook = move |stage: WriteStage, _path: &Path| -> io::Result<()> {
        if stage == WriteStage::TempWritten && seen.fetch_add(1, Ordering::SeqCst) + 1 == n {
            return Err(io::Error::new(io::ErrorKind::Other, "forced failure"));
        }
        Ok(())
    };
    Arc::new(AtomicWriter::new().with_hook(Arc::new(hook)))
}

fn seed(dir: &Path) {
    let store = DocumentStore::open(dir, Arc::new(AtomicWriter::new())).unwrap();
    store
        .write(DocumentName::Workflows, &json!({"workflows": [{"id": "w0"}]}))
        .unwrap();
    store.write(DocumentName::StoreState, &json!({"active": "w0"})).unwrap();
    store.write(DocumentName::Sessions, &json!({"sessions": ["s0"]})).unwrap();
}

#[test]
fn test_second_of_three_fails_all_revert() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let before: Vec<Vec<u8>> = DocumentName::ALL
        .iter()
        .map(|n| std::fs::read(dir.path().join(n.file_name())).unwrap())
        .collect();

    let store = DocumentStore::open(dir.path(), fail_nth_write(2)).unwrap();
    let mut batch = store.batch();
    batch
        .put(DocumentName::Workflows, &json!({"workflows": []}))
        .unwrap()
        .put(DocumentName::StoreState, &json!({"active": null}))
        .unwrap()
        .put(DocumentName::Sessions, &json!({"sessions": []}))
        .unwrap();

    let err = batch.commit().unwrap_err();

    match err {
        StoreError::Batch(batch_err) => {
            assert_eq!(batch_err.failed_at(), 1);
            assert!(batch_err.rolled_back());
        }
        other => panic!("expected batch error, got {other:?}"),
    }

    let after: Vec<Vec<u8>> = DocumentName::ALL
        .iter()
        .map(|n| std::fs::read(dir.path().join(n.file_name())).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_failed_batch_publishes_no_event() {
    let dir = TempDir::new().unwrap();
    seed(dir.path());
    let store = DocumentStore::open(dir.path(), fail_nth_write(1)).unwrap();
    let rx = store.events().subscribe();

    let mut batch = store.batch();
    batch.put(DocumentName::Sessions, &json!({"sessions": []})).unwrap();
    assert!(batch.commit().is_err());

    assert!(rx.try_recv().is_err());
}

#[test]
fn test_batch_is_serialized_with_single_writes() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(DocumentStore::open(dir.path(), Arc::new(AtomicWriter::new())).unwrap());

    let writer = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            for i in 0..50 {
                store
                    .write(DocumentName::StoreState, &json!({"counter": i}))
                    .unwrap();
            }
        })
    };

    for i in 0..50 {
        let mut batch = store.batch();
        batch
            .put(DocumentName::Workflows, &json!({"workflows": [i]}))
            .unwrap()
            .put(DocumentName::StoreState, &json!({"counter": -i}))
            .unwrap();
        batch.commit().unwrap();
    }
    writer.join().unwrap();

    let state = store.read(DocumentName::StoreState).unwrap();
    assert!(state["counter"].is_i64());
}
