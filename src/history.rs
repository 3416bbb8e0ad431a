//! Naming scheme for the hidden snapshot area. Pure string composition, no I/O.
//!
//! Scope (per the design notes): virtual paths are assumed to contain no embedded
//! slashes, i.e. a single-directory-deep mount. `name` below is always the bare file
//! name, identical to the mount-relative virtual path in that scope.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Name of the hidden history root directory, relative to the backing root.
pub const HISTORY_DIR_NAME: &str = ".vers";

/// Name of the per-file counter record inside a history directory.
pub const COUNTER_FILE_NAME: &str = "next_vers.txt";

fn with_suffix(name: &OsStr, suffix: &str) -> OsString {
    let mut out = OsString::with_capacity(name.len() + suffix.len());
    out.push(name);
    out.push(suffix);
    out
}

/// `H = B/.vers`
pub fn history_root(backing_root: &Path) -> PathBuf {
    backing_root.join(HISTORY_DIR_NAME)
}

/// `H/p_hist/`
pub fn hist_dir(backing_root: &Path, name: &OsStr) -> PathBuf {
    history_root(backing_root).join(with_suffix(name, "_hist"))
}

/// `H/p_hist/next_vers.txt`
pub fn counter_path(backing_root: &Path, name: &OsStr) -> PathBuf {
    hist_dir(backing_root, name).join(COUNTER_FILE_NAME)
}

/// `H/p_hist/p,k`
pub fn snapshot_path(backing_root: &Path, name: &OsStr, version: u32) -> PathBuf {
    hist_dir(backing_root, name).join(with_suffix(name, &format!(",{version}")))
}

/// True iff `name` is the reserved history root's own name, i.e. it must be hidden
/// from a `readdir` of the mount root (§4.7).
pub fn is_history_root_name(name: &OsStr) -> bool {
    name.as_bytes() == HISTORY_DIR_NAME.as_bytes()
}
