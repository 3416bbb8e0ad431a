//! Per-file monotonic version counter, persisted as a small text record.
//!
//! `next_vers.txt` holds the version number that will be assigned to the *next*
//! snapshot. The on-disk width is deliberately narrow — §9 of the design notes caps
//! supported version numbers at 99, matching the original C implementation's 2-byte
//! write rather than growing the encoding past its historical shape.

use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::history;

/// Highest version number this registry will hand out. One past this and the
/// 2-byte on-disk encoding would need a third digit, so `advance` errors instead.
pub const MAX_VERSION: u32 = 99;

fn ensure_dir(path: &Path, mode: u32) -> io::Result<()> {
    match fs::create_dir(path) {
        Ok(()) => {
            fs::set_permissions(path, std::os::unix::fs::PermissionsExt::from_mode(mode))?;
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

fn parse_counter(buf: &[u8]) -> io::Result<u32> {
    let digits = buf.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            "next_vers.txt does not start with a decimal digit",
        ));
    }
    std::str::from_utf8(&buf[..digits])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidData, "next_vers.txt is not a valid u32"))
}

/// Encode `n` the way the original C writer did: a 2-byte write where single-digit
/// values land as `[digit, 0]` (the NUL is `sprintf`'s terminator spilling into the
/// second byte) and two-digit values fill both bytes with no terminator.
fn encode_counter(n: u32) -> io::Result<[u8; 2]> {
    if n > MAX_VERSION {
        return Err(io::Error::new(
            ErrorKind::Other,
            "version counter exceeded the 2-digit on-disk encoding",
        ));
    }
    let s = n.to_string();
    let digits = s.as_bytes();
    let mut out = [0u8; 2];
    out[0] = digits[0];
    out[1] = if digits.len() == 2 { digits[1] } else { 0 };
    Ok(out)
}

/// `advance(/p) -> (assigned, previous_if_any)` (§4.4).
///
/// Creates `H` and `H/p_hist/` on demand, seeding the counter at `0` the first time.
/// Returns the version number assigned to the caller's upcoming snapshot and the
/// previous version number, if any.
pub fn advance(backing_root: &Path, name: &OsStr) -> io::Result<(u32, Option<u32>)> {
    let history_root = history::history_root(backing_root);
    ensure_dir(&history_root, 0o755)?;

    let hist_dir = history::hist_dir(backing_root, name);
    let freshly_created = match fs::create_dir(&hist_dir) {
        Ok(()) => {
            fs::set_permissions(&hist_dir, std::os::unix::fs::PermissionsExt::from_mode(0o755))?;
            true
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => false,
        Err(e) => return Err(e),
    };

    let counter_path = history::counter_path(backing_root, name);
    if freshly_created {
        fs::write(&counter_path, b"0")?;
    }

    let counter_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&counter_path)?;

    let mut buf = [0u8; 3];
    let read = counter_file.read_at(&mut buf, 0)?;
    let n = parse_counter(&buf[..read])?;

    let assigned = n;
    let previous = if n > 0 { Some(n - 1) } else { None };

    let encoded = encode_counter(n + 1)?;
    counter_file.write_at(&encoded, 0)?;

    Ok((assigned, previous))
}

/// Read the current value of `next_vers.txt` without advancing it. Used by the
/// reaper, which needs the snapshot count but must never create history for a file
/// that doesn't have any.
pub fn peek(backing_root: &Path, name: &OsStr) -> io::Result<u32> {
    let counter_path = history::counter_path(backing_root, name);
    let bytes = fs::read(counter_path)?;
    let len = bytes.len().min(3);
    parse_counter(&bytes[..len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_advance_assigns_zero_with_no_previous() {
        let dir = TempDir::new().unwrap();
        let (assigned, previous) = advance(dir.path(), OsStr::new("a.txt")).unwrap();
        assert_eq!(assigned, 0);
        assert_eq!(previous, None);
        let counter = history::counter_path(dir.path(), OsStr::new("a.txt"));
        assert_eq!(fs::read(counter).unwrap(), b"1\0");
    }

    #[test]
    fn successive_advances_are_dense_and_monotonic() {
        let dir = TempDir::new().unwrap();
        let name = OsStr::new("a.txt");
        for expected in 0..12u32 {
            let (assigned, previous) = advance(dir.path(), name).unwrap();
            assert_eq!(assigned, expected);
            assert_eq!(previous, expected.checked_sub(1));
        }
    }

    #[test]
    fn crossing_two_digits_still_parses_correctly() {
        let dir = TempDir::new().unwrap();
        let name = OsStr::new("a.txt");
        for _ in 0..10 {
            advance(dir.path(), name).unwrap();
        }
        let (assigned, previous) = advance(dir.path(), name).unwrap();
        assert_eq!(assigned, 10);
        assert_eq!(previous, Some(9));
        let counter = history::counter_path(dir.path(), name);
        assert_eq!(fs::read(counter).unwrap(), b"11");
    }

    #[test]
    fn exceeding_the_cap_errors_without_corrupting_state() {
        let dir = TempDir::new().unwrap();
        let name = OsStr::new("a.txt");
        // Versions 0..MAX_VERSION (99 of them) fit the 2-byte encoding.
        for _ in 0..MAX_VERSION {
            advance(dir.path(), name).unwrap();
        }
        // The 100th assignment would need to persist counter value 100, which no
        // longer fits; it must fail cleanly rather than wrap or corrupt the file.
        let before = fs::read(history::counter_path(dir.path(), name)).unwrap();
        assert!(advance(dir.path(), name).is_err());
        let after = fs::read(history::counter_path(dir.path(), name)).unwrap();
        assert_eq!(before, after, "a failed advance must not mutate the counter");
    }
}
