//! Integration tests exercising the engine's pure/file-backed modules together against
//! a real temporary directory, covering the testable properties and literal end-to-end
//! scenarios (§8). These drive the engine directly rather than through a kernel mount,
//! since the transport is out of scope (§1) and not exercised here.

use std::ffi::OsStr;
use std::fs;

use overlayfs::{cipher, history, reaper, snapshot, version_registry};
use tempfile::TempDir;

/// Emulates what `OverlayFs::write` does for the Versioned variant: snapshot first,
/// then update the live file — mirroring the ordering §4.5/§7 require.
fn versioned_write(backing: &std::path::Path, name: &OsStr, data: &[u8], offset: i64) -> u32 {
    let version = snapshot::build_and_persist(backing, name, data, offset).unwrap();
    let live = backing.join(name);
    let mut existing = fs::read(&live).unwrap_or_default();
    let end = offset as usize + data.len();
    if existing.len() < end {
        existing.resize(end, 0);
    }
    existing[offset as usize..end].copy_from_slice(data);
    fs::write(&live, &existing).unwrap();
    version
}

// Scenario 1
#[test]
fn scenario_first_write_creates_version_zero() {
    let dir = TempDir::new().unwrap();
    let name = OsStr::new("a");
    versioned_write(dir.path(), name, b"hello", 0);

    assert_eq!(fs::read(dir.path().join("a")).unwrap(), b"hello");
    assert_eq!(version_registry::peek(dir.path(), name).unwrap(), 1);
    assert_eq!(
        fs::read(history::snapshot_path(dir.path(), name, 0)).unwrap(),
        b"hello"
    );
}

// Scenario 2
#[test]
fn scenario_second_write_extends_the_live_file_and_snapshots_it() {
    let dir = TempDir::new().unwrap();
    let name = OsStr::new("a");
    versioned_write(dir.path(), name, b"hello", 0);
    versioned_write(dir.path(), name, b"WORLD", 5);

    assert_eq!(fs::read(dir.path().join("a")).unwrap(), b"helloWORLD");
    assert_eq!(
        fs::read(history::snapshot_path(dir.path(), name, 1)).unwrap(),
        b"helloWORLD"
    );
    assert_eq!(version_registry::peek(dir.path(), name).unwrap(), 2);
}

// Scenario 3
#[test]
fn scenario_interior_write_mutates_live_file_but_snapshots_only_the_merged_prefix() {
    let dir = TempDir::new().unwrap();
    let name = OsStr::new("a");
    versioned_write(dir.path(), name, b"hello", 0);
    versioned_write(dir.path(), name, b"WORLD", 5);
    versioned_write(dir.path(), name, b"XX", 2);

    assert_eq!(fs::read(dir.path().join("a")).unwrap(), b"heXXoWORLD");
    assert_eq!(
        fs::read(history::snapshot_path(dir.path(), name, 2)).unwrap(),
        b"heXX"
    );
}

// Scenario 4
#[test]
fn scenario_cipher_round_trips_through_the_backing_file() {
    let dir = TempDir::new().unwrap();
    let key = 3;
    let plaintext = b"abc";
    let staged = cipher::encrypt(plaintext, key);
    assert_eq!(staged, vec![0x64, 0x65, 0x66]);

    let backing_path = dir.path().join("b");
    fs::write(&backing_path, &staged).unwrap();

    let raw = fs::read(&backing_path).unwrap();
    let recovered = cipher::decrypt(&raw, key);
    assert_eq!(recovered, plaintext);
}

// Scenario 5
#[test]
fn scenario_unlink_removes_the_live_file_and_its_entire_history() {
    let dir = TempDir::new().unwrap();
    let name = OsStr::new("a");
    versioned_write(dir.path(), name, b"hello", 0);
    versioned_write(dir.path(), name, b"WORLD", 5);
    versioned_write(dir.path(), name, b"XX", 2);

    fs::remove_file(dir.path().join("a")).unwrap();
    reaper::reap_history(dir.path(), name).unwrap();

    assert!(!dir.path().join("a").exists());
    assert!(!history::hist_dir(dir.path(), name).exists());
    assert!(history::history_root(dir.path()).exists());
}

// Scenario 6 / P8
#[test]
fn scenario_history_root_is_always_filtered_from_a_root_listing() {
    let dir = TempDir::new().unwrap();
    let name = OsStr::new("a");
    versioned_write(dir.path(), name, b"hello", 0);

    let visible: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .filter(|n| !history::is_history_root_name(n))
        .collect();

    assert!(visible.contains(&std::ffi::OsString::from("a")));
    assert!(!visible.iter().any(|n| n == ".vers"));
    assert!(dir.path().join(".vers").exists());
}

// P4
#[test]
fn p4_version_density_after_several_writes() {
    let dir = TempDir::new().unwrap();
    let name = OsStr::new("f");
    for i in 0..5u8 {
        versioned_write(dir.path(), name, &[i], 0);
    }
    assert_eq!(version_registry::peek(dir.path(), name).unwrap(), 5);
    for k in 0..5u32 {
        assert!(history::snapshot_path(dir.path(), name, k).exists());
    }
}

// P9
#[test]
fn p9_creating_a_file_without_writing_leaves_no_history() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("untouched"), b"").unwrap();
    assert!(!history::history_root(dir.path()).exists());
}

// P3, general key
#[test]
fn p3_cipher_round_trip_holds_for_arbitrary_keys_and_windows() {
    let plaintext = b"0123456789abcdef";
    for key in [-128, -1, 0, 1, 77, 255, 1000] {
        let staged = cipher::encrypt(plaintext, key);
        for off in 0..plaintext.len() {
            for len in 0..(plaintext.len() - off) {
                let window = &staged[off..off + len];
                let recovered = cipher::decrypt(window, key);
                assert_eq!(recovered, &plaintext[off..off + len]);
            }
        }
    }
}

// P7, explicit on a file with no history (reaper must still be a no-op, not an error)
#[test]
fn p7_reaper_is_a_no_op_when_there_is_no_history_to_reap() {
    let dir = TempDir::new().unwrap();
    let name = OsStr::new("never-written");
    fs::write(dir.path().join("never-written"), b"").unwrap();
    fs::remove_file(dir.path().join("never-written")).unwrap();
    assert!(reaper::reap_history(dir.path(), name).is_ok());
}
