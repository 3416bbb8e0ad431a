//! Garbage-collects a file's snapshot history on `unlink` (§4.8).

use std::ffi::OsStr;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

use crate::{history, version_registry};

/// Remove all snapshots, the counter record, and the history directory for `name`.
///
/// Assumes the live file has already been unlinked by the caller (§4.8 step 1) —
/// this function only tears down `H/p_hist/`. A missing history directory is not an
/// error: a file that was created but never written has no history to reap (P9).
///
/// Best-effort past that point: a failure partway through is returned as-is and may
/// leave the history directory in a partially torn-down state, matching the spec's
/// explicit non-goal of crash consistency for the history store.
pub fn reap_history(backing_root: &Path, name: &OsStr) -> io::Result<()> {
    let hist_dir = history::hist_dir(backing_root, name);
    if !hist_dir.exists() {
        return Ok(());
    }

    let count = version_registry::peek(backing_root, name)?;
    for version in 0..count {
        let snapshot_path = history::snapshot_path(backing_root, name, version);
        if let Err(e) = fs::remove_file(&snapshot_path) {
            if e.kind() != ErrorKind::NotFound {
                return Err(e);
            }
        }
    }

    fs::remove_file(history::counter_path(backing_root, name))?;
    fs::remove_dir(&hist_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot;
    use std::ffi::OsStr;
    use tempfile::TempDir;

    #[test]
    fn reaping_a_file_with_no_history_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        assert!(reap_history(dir.path(), OsStr::new("never-written")).is_ok());
        assert!(!history::history_root(dir.path()).exists());
    }

    #[test]
    fn reaping_removes_every_snapshot_and_the_history_directory() {
        let dir = TempDir::new().unwrap();
        let name = OsStr::new("a");
        snapshot::build_and_persist(dir.path(), name, b"hello", 0).unwrap();
        snapshot::build_and_persist(dir.path(), name, b"WORLD", 5).unwrap();

        reap_history(dir.path(), name).unwrap();

        assert!(!history::hist_dir(dir.path(), name).exists());
        // The shared history root itself may remain (possibly empty).
        assert!(history::history_root(dir.path()).exists());
    }
}
