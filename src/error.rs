//! Facade error type

use std::io;

use docvault_backup::{RestoreError, SnapshotError};
use docvault_core::ConfigError;
use docvault_durability::StoreError;

/// Any error surfaced by [`DocVault`](crate::DocVault)
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration is invalid
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Reading or writing a document failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A snapshot operation failed
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// A restore failed or was refused
    #[error(transparent)]
    Restore(#[from] RestoreError),

    /// The scheduler thread could not be spawned
    #[error("Failed to start snapshot scheduler: {0}")]
    Scheduler(#[source] io::Error),
}

impl Error {
    /// Whether the caller's request was at fault.
    ///
    /// The HTTP layer maps `true` to a 400-class response and `false` to a
    /// 500-class response.
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::Restore(e) => e.is_validation(),
            Error::Snapshot(e) => matches!(
                e,
                SnapshotError::InvalidIdentifier(_) | SnapshotError::NotFound { .. }
            ),
            Error::Store(_) | Error::Scheduler(_) => false,
        }
    }
}

/// Result type for facade operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use docvault_backup::SnapshotId;

    #[test]
    fn test_client_error_classification() {
        let invalid = SnapshotId::parse("../../etc").unwrap_err();
        assert!(Error::from(RestoreError::from(invalid.clone())).is_client_error());
        assert!(Error::from(SnapshotError::from(invalid)).is_client_error());
        assert!(Error::from(ConfigError::ZeroInterval).is_client_error());
        assert!(Error::from(SnapshotError::NotFound { id: "x".into() }).is_client_error());

        let io_err = SnapshotError::Io {
            op: "read archive",
            path: "/backups/x".into(),
            source: io::Error::new(io::ErrorKind::Other, "disk"),
        };
        assert!(!Error::from(io_err).is_client_error());
        assert!(!Error::Scheduler(io::Error::new(io::ErrorKind::Other, "spawn")).is_client_error());
    }
}
