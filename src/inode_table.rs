//! Bidirectional inode-number/relative-path table.
//!
//! `fuser`'s `Filesystem` trait is inode-addressed, but the engine underneath speaks
//! paths (§4.1). Grounded on `xmp.rs`'s `inode_to_physical_path` / `mounted_path_to_inode`
//! pair, collapsed from a pair of `DashMap`s into one `Mutex`-guarded table since this
//! engine has no async handlers to avoid blocking.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Inode number of the mount root. Reserved by FUSE and never recycled.
pub const ROOT_INO: u64 = 1;

struct Entry {
    path: PathBuf,
    lookups: u64,
}

struct Inner {
    by_path: HashMap<PathBuf, u64>,
    by_ino: HashMap<u64, Entry>,
    next_ino: u64,
}

/// Tracks every inode the kernel currently holds a reference to, mapping each back to
/// the mount-relative path it names.
pub struct InodeTable {
    inner: Mutex<Inner>,
}

impl InodeTable {
    pub fn new() -> Self {
        let mut by_path = HashMap::new();
        let mut by_ino = HashMap::new();
        by_path.insert(PathBuf::new(), ROOT_INO);
        by_ino.insert(
            ROOT_INO,
            Entry {
                path: PathBuf::new(),
                lookups: 1,
            },
        );
        Self {
            inner: Mutex::new(Inner {
                by_path,
                by_ino,
                next_ino: ROOT_INO + 1,
            }),
        }
    }

    /// Resolve an inode to the mount-relative path it currently names.
    pub fn path_of(&self, ino: u64) -> Option<PathBuf> {
        let inner = self.inner.lock().unwrap();
        inner.by_ino.get(&ino).map(|e| e.path.clone())
    }

    /// Assign (or reuse) the inode for `relative`, incrementing its lookup count. Mirrors
    /// the kernel's lookup/forget refcounting contract: each call here must be balanced by
    /// a `forget` carrying the same count eventually.
    pub fn lookup(&self, relative: &Path) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        if let Some(&ino) = inner.by_path.get(relative) {
            inner.by_ino.get_mut(&ino).unwrap().lookups += 1;
            return ino;
        }
        let ino = inner.next_ino;
        inner.next_ino += 1;
        inner.by_path.insert(relative.to_path_buf(), ino);
        inner.by_ino.insert(
            ino,
            Entry {
                path: relative.to_path_buf(),
                lookups: 1,
            },
        );
        ino
    }

    /// Drop `nlookup` references to `ino`; once the count reaches zero the mapping is
    /// removed (the root inode is exempt, matching the kernel's own contract).
    pub fn forget(&self, ino: u64, nlookup: u64) {
        if ino == ROOT_INO {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        let remove = match inner.by_ino.get_mut(&ino) {
            Some(entry) => {
                entry.lookups = entry.lookups.saturating_sub(nlookup);
                entry.lookups == 0
            }
            None => false,
        };
        if remove {
            if let Some(entry) = inner.by_ino.remove(&ino) {
                inner.by_path.remove(&entry.path);
            }
        }
    }

    /// Update the path recorded for an inode after a rename. Does not touch any
    /// descendant inodes cached under the old path; those are revalidated on next
    /// lookup, same simplification as the upstream passthrough example this is modeled on.
    pub fn reparent(&self, old: &Path, new: &Path) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(ino) = inner.by_path.remove(old) {
            inner.by_path.insert(new.to_path_buf(), ino);
            if let Some(entry) = inner.by_ino.get_mut(&ino) {
                entry.path = new.to_path_buf();
            }
        }
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
