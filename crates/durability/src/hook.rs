//! Write-stage hooks
//!
//! The atomic writer reports each step of a write to a [`WriteHook`]. In
//! production the hook is a no-op. Tests use it as a fault-injection point:
//!
//! - returning `Err` fails the step, exercising cleanup and rollback
//! - panicking models a process crash: the unwind skips all cleanup, which
//!   leaves exactly the on-disk state a crash at that point would leave

use std::fmt;
use std::io;
use std::path::Path;

/// A step in the life of one atomic write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteStage {
    /// Sidecar backup copied; path is the backup file
    BackupCreated,
    /// Temp file written and fsynced, not yet verified or renamed; path is
    /// the temp file.
    TempWritten,
    /// Temp file renamed over the target; path is the target
    Committed,
    /// About to copy a sidecar backup back over its target; path is the
    /// target.
    RollbackRestore,
}

impl WriteStage {
    /// Stage name for logs and error context
    pub fn name(&self) -> &'static str {
        match self {
            WriteStage::BackupCreated => "backup_created",
            WriteStage::TempWritten => "temp_written",
            WriteStage::Committed => "committed",
            WriteStage::RollbackRestore => "rollback_restore",
        }
    }
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observer of write stages
pub trait WriteHook: Send + Sync {
    /// Called after `stage` completes for `path`
    fn on_stage(&self, stage: WriteStage, path: &Path) -> io::Result<()>;
}

/// Hook that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl WriteHook for NoopHook {
    fn on_stage(&self, _stage: WriteStage, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

impl<F> WriteHook for F
where
    F: Fn(WriteStage, &Path) -> io::Result<()> + Send + Sync,
{
    fn on_stage(&self, stage: WriteStage, path: &Path) -> io::Result<()> {
        self(stage, path)
    }
}
