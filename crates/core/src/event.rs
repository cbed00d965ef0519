//! Change notifications
//!
//! Components publish [`VaultEvent`]s after their commit point. Subscribers
//! (the WebSocket fan-out, for instance) each get their own channel.
//! Publishing never blocks: channels are unbounded and receivers that have
//! been dropped are pruned on the next publish.

use crate::document::DocumentName;
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

/// Something that changed on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    /// A single document was committed
    DocumentUpdated {
        /// Document that changed
        document: DocumentName,
    },
    /// A batch committed every member
    BatchCommitted {
        /// Documents in the batch, in commit order
        documents: Vec<DocumentName>,
    },
    /// A snapshot was added to the ledger
    SnapshotCreated {
        /// Snapshot identifier
        snapshot_id: String,
    },
    /// Snapshots were removed from the ledger
    SnapshotsPruned {
        /// Removed identifiers
        snapshot_ids: Vec<String>,
    },
    /// Documents were restored from a snapshot
    SnapshotRestored {
        /// Snapshot identifier
        snapshot_id: String,
        /// Documents written back
        documents: Vec<DocumentName>,
    },
}

/// Fan-out of [`VaultEvent`]s to any number of subscribers
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<VaultEvent>>>,
}

impl EventBus {
    /// Create a bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Receiver<VaultEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber
    pub fn publish(&self, event: VaultEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers (as of the last publish)
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
