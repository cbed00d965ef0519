//! Filesystem helpers shared by the writers
//!
//! # Naming conventions
//!
//! Every transient file lives next to its target so the commit rename never
//! crosses a filesystem boundary:
//!
//! - temp file: `.<file_name>.<uuid>.tmp`
//! - sidecar backup: `.<file_name>.<uuid>.bak`
//!
//! Both are hidden dot-files with a fixed suffix, which is what
//! [`sweep_orphans`] matches on after a crash.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const TEMP_SUFFIX: &str = ".tmp";
const BACKUP_SUFFIX: &str = ".bak";

/// Unique temp path in the target's directory
pub fn temp_path_for(target: &Path) -> PathBuf {
    sibling(target, TEMP_SUFFIX)
}

/// Unique sidecar backup path in the target's directory
pub fn backup_path_for(target: &Path) -> PathBuf {
    sibling(target, BACKUP_SUFFIX)
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = format!(".{}.{}{}", name, Uuid::new_v4().simple(), suffix);
    match target.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Whether a file name follows the temp file convention
pub fn is_temp_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

/// Whether a file name follows the sidecar backup convention
pub fn is_backup_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(BACKUP_SUFFIX)
}

/// Parent directory of `path`, or `.` for bare file names
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Fsync a file's contents
pub fn sync_file(path: &Path) -> io::Result<()> {
    let f = OpenOptions::new().write(true).open(path)?;
    f.sync_all()
}

/// Fsync a directory so renames inside it are durable.
///
/// On non-Unix platforms directories cannot be opened for sync; the OS is
/// responsible for rename durability there.
#[allow(clippy::unnecessary_wraps)]
pub fn sync_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)?;
        dir.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Remove a file, treating "already gone" as success
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// What [`sweep_orphans`] removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Orphaned temp files removed
    pub temp_files: usize,
    /// Orphaned sidecar backups removed
    pub backups: usize,
}

impl SweepReport {
    /// Total files removed
    pub fn total(&self) -> usize {
        self.temp_files + self.backups
    }
}

/// Remove temp files and sidecar backups left behind by a crash.
///
/// Only the top level of `dir` is scanned. Orphans are inert: no reader
/// resolves through them, so removal never changes a committed document.
/// Individual removal failures are logged and skipped.
pub fn sweep_orphans(dir: &Path) -> io::Result<SweepReport> {
    let mut report = SweepReport::default();

    if !dir.exists() {
        return Ok(report);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let is_temp = is_temp_file(&name);
        if !is_temp && !is_backup_file(&name) {
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!(target: "docvault::store", file = %name, "Removed orphaned file");
                if is_temp {
                    report.temp_files += 1;
                } else {
                    report.backups += 1;
                }
            }
            Err(e) => {
                warn!(target: "docvault::store", file = %name, error = %e, "Failed to remove orphaned file");
            }
        }
    }

    Ok(report)
}
