//! Builds and persists an immutable snapshot of a file's post-write content (§4.5).

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::os::unix::fs::{FileExt, PermissionsExt};
use std::path::Path;

use crate::{history, version_registry};

/// Construct the full post-write content for this snapshot and persist it, advancing
/// the version counter in the process. Returns the version number just persisted.
///
/// Must run *before* the live file is updated: §7 requires write atomicity with
/// respect to history creation, so any failure here must leave the live file
/// untouched.
pub fn build_and_persist(
    backing_root: &Path,
    name: &OsStr,
    data: &[u8],
    offset: i64,
) -> io::Result<u32> {
    let (version, previous) = version_registry::advance(backing_root, name)?;

    let content = if offset == 0 {
        data.to_vec()
    } else {
        let offset = offset as usize;
        let mut buf = vec![0u8; offset];
        if let Some(prev_version) = previous {
            let prev_path = history::snapshot_path(backing_root, name, prev_version);
            match File::open(&prev_path) {
                Ok(file) => {
                    // A short read at EOF leaves the remainder of `buf` at its
                    // preset zero, which is the right reconstruction for a prior
                    // snapshot shorter than the new write's offset (a sparse hole).
                    file.read_at(&mut buf, 0)?;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        buf.extend_from_slice(data);
        buf
    };

    let snapshot_path = history::snapshot_path(backing_root, name, version);
    fs::write(&snapshot_path, &content)?;
    fs::set_permissions(&snapshot_path, fs::Permissions::from_mode(0o600))?;

    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use tempfile::TempDir;

    #[test]
    fn offset_zero_snapshot_is_exactly_the_written_bytes() {
        let dir = TempDir::new().unwrap();
        let name = OsStr::new("a");
        let version = build_and_persist(dir.path(), name, b"hello", 0).unwrap();
        assert_eq!(version, 0);
        let snap = fs::read(history::snapshot_path(dir.path(), name, 0)).unwrap();
        assert_eq!(snap, b"hello");
    }

    #[test]
    fn interior_offset_merges_prior_prefix_with_new_bytes() {
        let dir = TempDir::new().unwrap();
        let name = OsStr::new("a");
        build_and_persist(dir.path(), name, b"helloWORLD", 0).unwrap();
        let version = build_and_persist(dir.path(), name, b"XX", 2).unwrap();
        assert_eq!(version, 1);
        let snap = fs::read(history::snapshot_path(dir.path(), name, 1)).unwrap();
        assert_eq!(snap, b"heXX");
    }

    #[test]
    fn chained_writes_match_the_end_to_end_scenario() {
        let dir = TempDir::new().unwrap();
        let name = OsStr::new("a");
        build_and_persist(dir.path(), name, b"hello", 0).unwrap();
        build_and_persist(dir.path(), name, b"WORLD", 5).unwrap();
        let version = build_and_persist(dir.path(), name, b"XX", 2).unwrap();
        assert_eq!(version, 2);
        let snap = fs::read(history::snapshot_path(dir.path(), name, 2)).unwrap();
        assert_eq!(snap, b"heXX");
    }

    #[test]
    fn first_write_at_an_interior_offset_zero_fills_the_missing_prefix() {
        let dir = TempDir::new().unwrap();
        let name = OsStr::new("a");
        let version = build_and_persist(dir.path(), name, b"tail", 4).unwrap();
        assert_eq!(version, 0);
        let snap = fs::read(history::snapshot_path(dir.path(), name, 0)).unwrap();
        assert_eq!(snap, b"\0\0\0\0tail");
    }
}
