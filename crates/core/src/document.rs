//! Logical document names
//!
//! The persistence layer manages a fixed set of documents. Each one is
//! backed by exactly one JSON file in the documents directory. The set is
//! closed: restore refuses any archive that does not map to one of these
//! names, so [`DocumentName::ALL`] doubles as the restore allow-list.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// A document tracked by the persistence layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentName {
    /// Workflow collection
    Workflows,
    /// Application store state
    StoreState,
    /// Session collection
    Sessions,
}

impl DocumentName {
    /// Every tracked document, in lock-acquisition order
    pub const ALL: [DocumentName; 3] = [
        DocumentName::Workflows,
        DocumentName::StoreState,
        DocumentName::Sessions,
    ];

    /// Logical name (`workflows`, `store-state`, `sessions`)
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentName::Workflows => "workflows",
            DocumentName::StoreState => "store-state",
            DocumentName::Sessions => "sessions",
        }
    }

    /// File name of the backing document
    pub fn file_name(&self) -> &'static str {
        match self {
            DocumentName::Workflows => "workflows.json",
            DocumentName::StoreState => "store-state.json",
            DocumentName::Sessions => "sessions.json",
        }
    }

    /// Value written when the document is absent at startup
    pub fn default_value(&self) -> Value {
        match self {
            DocumentName::Workflows => json!({ "workflows": [] }),
            DocumentName::StoreState => json!({}),
            DocumentName::Sessions => json!({ "sessions": [] }),
        }
    }

    /// Look up a document by logical name.
    ///
    /// Only exact matches are accepted. This is the allow-list check used
    /// when a snapshot ledger entry is turned back into a target path.
    pub fn parse(name: &str) -> Option<Self> {
        DocumentName::ALL.into_iter().find(|d| d.as_str() == name)
    }
}

impl fmt::Display for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a tracked document name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown document: {0}")]
pub struct UnknownDocument(pub String);

impl FromStr for DocumentName {
    type Err = UnknownDocument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentName::parse(s).ok_or_else(|| UnknownDocument(s.to_string()))
    }
}
